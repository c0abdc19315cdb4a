use metrics::{describe_gauge, gauge};

/// Register the metrics describing this alert feed process
pub(super) fn register_metrics() {
    describe_gauge!(
        "process_start_time_seconds",
        "When the alert feed process started, in seconds since the Unix epoch"
    );

    describe_gauge!(
        "build_info",
        "Build information of the alert feed, labeled by package and version"
    );

    record_process_start_time();
    record_build_info();
}

/// Stamp the moment the alert feed came up
pub fn record_process_start_time() {
    let start_time = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

    gauge!("process_start_time_seconds").set(start_time);
}

/// Record the build information of the alert feed
pub fn record_build_info() {
    gauge!(
        "build_info",
        "package" => env!("CARGO_PKG_NAME"),
        "version" => env!("CARGO_PKG_VERSION")
    )
    .set(1.0);
}
