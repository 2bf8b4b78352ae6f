//! Behavior events (search / view) and the tags they imply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::content::ContentKind;
use crate::error::PortalError;
use crate::profile::UserId;

/// Dwell time above which a view counts as interest.
pub const VIEW_DWELL_THRESHOLD: f64 = 30.0;
/// Leading search tokens turned into tags.
pub const SEARCH_TAG_LIMIT: usize = 3;

const RECENT_MARKER: &str = "最近";
/// Checked in order, first hit wins.
const RECENT_PHRASES: &[(&str, &str)] = &[
    ("三个月", "最近三个月"),
    ("半年", "最近半年"),
    ("一年", "最近一年"),
];

/// What the user did, shaped `{"behavior_type": .., "details": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior_type", content = "details", rename_all = "lowercase")]
pub enum BehaviorAction {
    Search {
        #[serde(default)]
        query: String,
    },
    View {
        #[serde(default)]
        content_type: String,
        #[serde(default)]
        duration: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_id: Option<Value>,
    },
}

impl BehaviorAction {
    /// Build an action from the loose request shape.
    pub fn from_parts(behavior_type: &str, details: Value) -> Result<Self, PortalError> {
        let kind = behavior_type.trim();
        if kind.is_empty() {
            return Err(PortalError::Validation("behavior_type is required".into()));
        }
        if !matches!(kind, "search" | "view") {
            return Err(PortalError::Validation(format!(
                "unknown behavior type `{kind}`"
            )));
        }
        let details = if details.is_null() { json!({}) } else { details };
        serde_json::from_value(json!({ "behavior_type": kind, "details": details }))
            .map_err(|e| PortalError::Validation(format!("invalid behavior details: {e}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BehaviorAction::Search { .. } => "search",
            BehaviorAction::View { .. } => "view",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: UserId,
    pub action: BehaviorAction,
    pub timestamp: DateTime<Utc>,
}

impl BehaviorEvent {
    pub fn new(user_id: UserId, action: BehaviorAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id,
            action,
            timestamp,
        }
    }
}

/// Candidate tags implied by a single event.
pub fn infer_tags(event: &BehaviorEvent) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    match &event.action {
        BehaviorAction::Search { query } => {
            tags.extend(
                query
                    .split_whitespace()
                    .take(SEARCH_TAG_LIMIT)
                    .map(String::from),
            );
            if query.contains(RECENT_MARKER) {
                if let Some((_, tag)) = RECENT_PHRASES.iter().find(|(p, _)| query.contains(p)) {
                    tags.push((*tag).to_string());
                }
            }
        }
        BehaviorAction::View {
            content_type,
            duration,
            ..
        } => {
            if *duration > VIEW_DWELL_THRESHOLD {
                tags.push(format!("interested-in-{content_type}"));
            }
        }
    }
    tags
}

/// Short-term preference signal over a window of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorSummary {
    /// View tallies per content type, in first-seen order.
    pub view_counts: Vec<(String, usize)>,
    /// Whitespace tokens of every search query, in event order.
    pub keywords: Vec<String>,
}

impl BehaviorSummary {
    /// Events are expected most recent first.
    pub fn from_events(events: &[BehaviorEvent]) -> Self {
        let mut s = Self::default();
        for ev in events {
            match &ev.action {
                BehaviorAction::View { content_type, .. } => {
                    if content_type.is_empty() {
                        continue;
                    }
                    match s.view_counts.iter_mut().find(|(t, _)| t == content_type) {
                        Some((_, n)) => *n += 1,
                        None => s.view_counts.push((content_type.clone(), 1)),
                    }
                }
                BehaviorAction::Search { query } => {
                    s.keywords
                        .extend(query.split_whitespace().map(String::from));
                }
            }
        }
        s
    }

    /// Most viewed content type; ties go to the one seen first; "news" when
    /// there were no views.
    pub fn favorite_content_type(&self) -> &str {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.view_counts {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(t, _)| t.as_str()).unwrap_or("news")
    }

    /// The favorite type as a content collection; `None` for types the
    /// portal has no collection for.
    pub fn favorite_kind(&self) -> Option<ContentKind> {
        self.favorite_content_type().parse().ok()
    }

    pub fn leading_keywords(&self, n: usize) -> &[String] {
        &self.keywords[..self.keywords.len().min(n)]
    }
}

/// Short SHA-256 prefix, used to log queries without their text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
