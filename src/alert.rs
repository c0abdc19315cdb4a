use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default)]
    pub dismissed: bool,
}

/// Category of the business event behind an alert
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum AlertKind {
    Urgent,
    Deadline,
    Reminder,
    Info,
    Other(String),
}

impl From<String> for AlertKind {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "urgent" => AlertKind::Urgent,
            "deadline" => AlertKind::Deadline,
            "reminder" => AlertKind::Reminder,
            "info" => AlertKind::Info,
            _ => AlertKind::Other(value),
        }
    }
}

impl From<AlertKind> for String {
    fn from(value: AlertKind) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Urgent => write!(f, "urgent"),
            AlertKind::Deadline => write!(f, "deadline"),
            AlertKind::Reminder => write!(f, "reminder"),
            AlertKind::Info => write!(f, "info"),
            AlertKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// Alert priority. Known levels are ordered by severity; anything else the
/// source sends is kept verbatim in `Other` and ranks below `Low`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    Other(String),
}

impl Priority {
    /// Severity rank used for ordering
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Other(_) => 0,
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (Priority::Other(a), Priority::Other(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        })
    }
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "low" => Priority::Low,
            "medium" => Priority::Medium,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Other(value),
        }
    }
}

impl From<&str> for Priority {
    fn from(value: &str) -> Self {
        Priority::from(value.to_string())
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
            Priority::Other(priority) => write!(f, "{}", priority),
        }
    }
}
