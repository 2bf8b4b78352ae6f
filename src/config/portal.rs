// src/config/portal.rs
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PATH: &str = "PORTAL_CONFIG_PATH";

fn default_regions() -> Vec<String> {
    [
        "北京", "上海", "广州", "深圳", "天津", "重庆", "江苏", "浙江", "广东", "山东", "河北",
        "河南", "湖北", "湖南", "四川", "福建", "安徽", "江西",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_trading_products() -> Vec<String> {
    [
        "管道天然气",
        "液化天然气(LNG)",
        "压缩天然气(CNG)",
        "天然气期货",
        "天然气现货",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_system_users() -> Vec<String> {
    ["中国石化天然气分公司华南天然气销售中心", "华港燃气集团有限公司"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_candidate_pool_limit() -> usize {
    500
}

/// Portal settings: the fixed enumerations accepted at registration plus
/// the read bound used when the recommender pulls candidate pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    #[serde(default = "default_trading_products")]
    pub trading_products: Vec<String>,
    #[serde(default = "default_system_users")]
    pub system_users: Vec<String>,
    /// Upper bound on rows read per candidate pool.
    #[serde(default = "default_candidate_pool_limit")]
    pub candidate_pool_limit: usize,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            trading_products: default_trading_products(),
            system_users: default_system_users(),
            candidate_pool_limit: default_candidate_pool_limit(),
        }
    }
}

impl PortalConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cfg: PortalConfig = super::load_file(path.as_ref())?;
        Ok(cfg.sanitized())
    }

    /// $PORTAL_CONFIG_PATH → config/portal.toml → config/portal.json → built-in lists.
    pub fn load_default() -> anyhow::Result<Self> {
        match super::resolve_path(ENV_PATH, "portal")? {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn is_valid_region(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }

    pub fn is_valid_product(&self, product: &str) -> bool {
        self.trading_products.iter().any(|p| p == product)
    }

    fn sanitized(mut self) -> Self {
        self.regions = super::clean_list(self.regions);
        self.trading_products = super::clean_list(self.trading_products);
        self.system_users = super::clean_list(self.system_users);
        if self.regions.is_empty() {
            self.regions = default_regions();
        }
        if self.trading_products.is_empty() {
            self.trading_products = default_trading_products();
        }
        if self.candidate_pool_limit == 0 {
            self.candidate_pool_limit = default_candidate_pool_limit();
        }
        self
    }
}
