//! # Taxonomy
//! Static keyword dictionaries grouped by taxonomy group (region, product, policy).
//!
//! Each tag owns an ordered list of trigger substrings. The built-in table is
//! constructed once per process; a TOML/JSON file can replace it at start-up
//! (`TAXONOMY_PATH`, then `config/taxonomy.toml`, then `config/taxonomy.json`).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const ENV_TAXONOMY_PATH: &str = "TAXONOMY_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyGroup {
    Region,
    Product,
    Policy,
}

impl TaxonomyGroup {
    pub const ALL: [TaxonomyGroup; 3] = [
        TaxonomyGroup::Region,
        TaxonomyGroup::Product,
        TaxonomyGroup::Policy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyGroup::Region => "region",
            TaxonomyGroup::Product => "product",
            TaxonomyGroup::Policy => "policy",
        }
    }
}

impl fmt::Display for TaxonomyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxonomyGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "region" => Ok(TaxonomyGroup::Region),
            "product" => Ok(TaxonomyGroup::Product),
            "policy" => Ok(TaxonomyGroup::Policy),
            other => Err(format!("unknown taxonomy group `{other}`")),
        }
    }
}

/// One tag and the literal substrings that trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub triggers: Vec<String>,
}

impl TagRule {
    pub fn new(tag: &str, triggers: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Keyword dictionaries for all three groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub region: Vec<TagRule>,
    #[serde(default)]
    pub product: Vec<TagRule>,
    #[serde(default)]
    pub policy: Vec<TagRule>,
}

static BUILTIN: Lazy<Taxonomy> = Lazy::new(Taxonomy::default_seed);

impl Taxonomy {
    /// Shared built-in dictionaries.
    pub fn builtin() -> &'static Taxonomy {
        &BUILTIN
    }

    pub fn group(&self, group: TaxonomyGroup) -> &[TagRule] {
        match group {
            TaxonomyGroup::Region => &self.region,
            TaxonomyGroup::Product => &self.product,
            TaxonomyGroup::Policy => &self.policy,
        }
    }

    /// Which group a known tag belongs to (first match wins).
    pub fn group_of(&self, tag: &str) -> Option<TaxonomyGroup> {
        TaxonomyGroup::ALL
            .into_iter()
            .find(|g| self.group(*g).iter().any(|r| r.tag == tag))
    }

    pub fn is_known_tag(&self, tag: &str) -> bool {
        self.group_of(tag).is_some()
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let t: Taxonomy = toml::from_str(s)?;
        Ok(t.cleaned())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let t: Taxonomy = crate::config::load_file(path)?;
        Ok(t.cleaned())
    }

    /// $TAXONOMY_PATH → config/taxonomy.toml → config/taxonomy.json → built-in.
    pub fn load_default() -> anyhow::Result<Self> {
        match crate::config::resolve_path(ENV_TAXONOMY_PATH, "taxonomy")? {
            Some(p) => Self::load_from(&p),
            None => Ok(Self::builtin().clone()),
        }
    }

    /// Trim triggers, drop empty ones, drop rules left without triggers.
    fn cleaned(mut self) -> Self {
        for rules in [&mut self.region, &mut self.product, &mut self.policy] {
            for r in rules.iter_mut() {
                r.tag = r.tag.trim().to_string();
                r.triggers = crate::config::clean_list(std::mem::take(&mut r.triggers));
            }
            rules.retain(|r| !r.tag.is_empty() && !r.triggers.is_empty());
        }
        self
    }

    /// Built-in dictionaries for the Chinese natural-gas market.
    pub(crate) fn default_seed() -> Self {
        let region = vec![
            TagRule::new("上海", &["上海", "沪"]),
            TagRule::new("北京", &["北京", "京"]),
            TagRule::new("广州", &["广州", "广东", "粤"]),
            TagRule::new("深圳", &["深圳"]),
            TagRule::new("浙江", &["浙江", "杭州", "宁波"]),
            TagRule::new("江苏", &["江苏", "南京", "苏州"]),
            TagRule::new("山东", &["山东", "青岛", "济南"]),
            TagRule::new("天津", &["天津", "津"]),
            TagRule::new("重庆", &["重庆", "渝"]),
            TagRule::new("四川", &["四川", "成都", "川"]),
            TagRule::new("湖北", &["湖北", "武汉", "鄂"]),
            TagRule::new("湖南", &["湖南", "长沙", "湘"]),
            TagRule::new("河南", &["河南", "郑州", "豫"]),
            TagRule::new("河北", &["河北", "石家庄", "冀"]),
            TagRule::new("福建", &["福建", "福州", "厦门", "闽"]),
            TagRule::new("安徽", &["安徽", "合肥", "皖"]),
            TagRule::new("江西", &["江西", "南昌", "赣"]),
            TagRule::new("陕西", &["陕西", "西安", "陕"]),
            TagRule::new("新疆", &["新疆"]),
            TagRule::new("西藏", &["西藏"]),
            TagRule::new("内蒙古", &["内蒙古", "内蒙"]),
            TagRule::new("广西", &["广西", "南宁", "桂"]),
            TagRule::new("海南", &["海南", "海口"]),
            TagRule::new("贵州", &["贵州", "贵阳", "黔"]),
            TagRule::new("云南", &["云南", "昆明", "滇"]),
            TagRule::new("甘肃", &["甘肃", "兰州", "甘"]),
            TagRule::new("青海", &["青海", "西宁"]),
            TagRule::new("宁夏", &["宁夏", "银川"]),
            TagRule::new("黑龙江", &["黑龙江", "哈尔滨", "黑"]),
            TagRule::new("吉林", &["吉林", "长春", "吉"]),
            TagRule::new("辽宁", &["辽宁", "沈阳", "大连", "辽"]),
        ];

        let product = vec![
            TagRule::new("管道天然气", &["管道天然气", "管道气", "PNG"]),
            TagRule::new("液化天然气", &["液化天然气", "LNG", "液化气"]),
            TagRule::new("压缩天然气", &["压缩天然气", "CNG", "压缩气"]),
            TagRule::new("原油", &["原油", "石油"]),
            TagRule::new("成品油", &["成品油", "汽油", "柴油"]),
            TagRule::new("煤炭", &["煤炭", "煤"]),
        ];

        let policy = vec![
            TagRule::new("价格政策", &["价格", "定价", "价格机制", "价格管理"]),
            TagRule::new("市场改革", &["市场化", "改革", "市场建设"]),
            TagRule::new("民营经济", &["民营", "民企", "民营企业"]),
            TagRule::new(
                "绿色低碳",
                &["绿色", "低碳", "碳中和", "碳减排", "新能源"],
            ),
            TagRule::new("安全保供", &["保供", "供应", "储备", "应急"]),
            TagRule::new("交易规则", &["交易", "挂牌", "竞价", "交收"]),
            TagRule::new("质量标准", &["质量", "标准", "GB/", "国标"]),
            TagRule::new("监管政策", &["监管", "管理办法", "规范", "监督"]),
        ];

        Self {
            region,
            product,
            policy,
        }
    }
}
