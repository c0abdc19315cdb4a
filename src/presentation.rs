use crate::alert::{Alert, Priority};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Visual treatment of an alert card
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub class: &'static str,
    pub icon: Icon,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Icon {
    AlertTriangle,
    AlertCircle,
    Clock,
    Info,
    Bell,
}

/// Map a priority to its card styling. Unknown priorities get the neutral gray card.
pub fn priority_presentation(priority: &Priority) -> Presentation {
    match priority {
        Priority::Urgent => Presentation {
            class: "border-red-500 bg-red-50",
            icon: Icon::AlertTriangle,
        },
        Priority::High => Presentation {
            class: "border-orange-500 bg-orange-50",
            icon: Icon::AlertCircle,
        },
        Priority::Medium => Presentation {
            class: "border-yellow-500 bg-yellow-50",
            icon: Icon::Clock,
        },
        Priority::Low => Presentation {
            class: "border-blue-500 bg-blue-50",
            icon: Icon::Info,
        },
        Priority::Other(_) => Presentation {
            class: "border-gray-300 bg-gray-50",
            icon: Icon::Bell,
        },
    }
}

/// Human readable age of an alert relative to `now`.
///
/// Buckets are floored: under a minute is "Just now", then minutes, hours
/// and days. Timestamps in the future count as "Just now".
pub fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes();

    if minutes < 1 {
        return "Just now".to_string();
    }

    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = minutes / 60;

    if hours < 24 {
        return format!("{}h ago", hours);
    }

    format!("{}d ago", hours / 24)
}

/// What the feed shows at a given moment
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FeedView {
    /// Nothing has been loaded yet, render a skeleton
    Loading,
    /// Loaded and nothing left to act on
    AllClear { total: usize },
    Alerts {
        total: usize,
        active: usize,
        cards: Vec<AlertCard>,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertCard {
    #[serde(flatten)]
    pub alert: Alert,
    pub presentation: Presentation,
    pub age: String,
}

impl AlertCard {
    /// Render a card, computing the age against `now`
    pub fn render(alert: &Alert, now: DateTime<Utc>) -> Self {
        Self {
            alert: alert.clone(),
            presentation: priority_presentation(&alert.priority),
            age: relative_age(alert.created_at, now),
        }
    }
}
