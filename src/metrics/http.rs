use crate::metrics::Timer;
use metrics::{counter, describe_counter, describe_histogram};

/// Register the metrics served by the alert feed API
pub(super) fn register_metrics() {
    // Front end calls to the feed API, labeled with the route template
    describe_counter!(
        "http_requests_total",
        "Requests served by the alert feed API, by route"
    );

    describe_histogram!(
        "http_request_duration_seconds",
        "Time spent serving alert feed API requests, by route"
    );
}

/// Count a request to an alert feed API route
pub fn record_http_request(route: &'static str) {
    counter!("http_requests_total", "endpoint" => route).increment(1);
}

/// Time a request to an alert feed API route
pub fn http_request_timer(route: &'static str) -> Timer {
    Timer::new("http_request_duration_seconds").with_label("endpoint", route)
}
