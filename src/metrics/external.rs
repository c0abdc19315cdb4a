use crate::metrics::{Status, Timer};
use metrics::{counter, describe_counter, describe_histogram};

/// Register the metrics for the application
pub(super) fn register_metrics() {
    // Requests made to the alert source, labeled with the status (success or failure).
    describe_counter!(
        "alert_source_requests_total",
        "Total number of requests to the alert source"
    );

    describe_counter!(
        "alert_source_failures_total",
        "Total number of failed requests to the alert source"
    );

    describe_histogram!(
        "alert_source_duration_seconds",
        "Duration of alert source requests in seconds"
    );
}

/// Record a request to the alert source with the given status
pub fn record_alert_source_request(status: Status) {
    counter!("alert_source_requests_total", "status" => status.to_string()).increment(1);
}

/// Record a failed request to the alert source
pub fn record_alert_source_failure() {
    counter!("alert_source_failures_total").increment(1);
}

/// Create a timer for a request to the alert source
pub fn alert_source_timer() -> Timer {
    Timer::new("alert_source_duration_seconds")
}
