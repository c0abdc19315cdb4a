use crate::feed::RefreshOutcome;
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register the metrics for the application
pub(super) fn register_metrics() {
    // Count of refreshes. Should be labeled with the outcome (success, failure or stale).
    describe_counter!("feed_refreshes_total", "Total number of feed refreshes");

    // Alerts currently held, labeled with the state (active or dismissed).
    describe_gauge!("feed_alerts", "Number of alerts currently held by the feed");

    describe_counter!(
        "feed_dismissals_total",
        "Total number of alerts dismissed by users"
    );

    describe_gauge!(
        "last_successful_refresh_timestamp",
        "Timestamp of the last successful feed refresh"
    );
}

/// Record a refresh with the given outcome
pub fn record_refresh(outcome: RefreshOutcome) {
    counter!("feed_refreshes_total", "status" => outcome.to_string()).increment(1);
}

/// Record the number of active and dismissed alerts
pub fn record_alert_counts(active: usize, dismissed: usize) {
    gauge!("feed_alerts", "state" => "active").set(active as f64);
    gauge!("feed_alerts", "state" => "dismissed").set(dismissed as f64);
}

/// Record dismissals made by users
pub fn record_dismissals(count: usize) {
    counter!("feed_dismissals_total").increment(count as u64);
}

/// Record the timestamp of the last successful refresh
pub fn record_successful_refresh() {
    let timestamp = chrono::Utc::now().timestamp() as f64;

    gauge!("last_successful_refresh_timestamp").set(timestamp);
}
