//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    // Directory calls shell out, so latencies run from milliseconds to the
    // command timeout
    let buckets = vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

    let handle = PrometheusBuilder::new()
        .set_buckets(&buckets)?
        .install_recorder()?;
    Ok(handle)
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup.
pub fn describe_metrics() {
    // Directory
    describe_counter!(
        "acf_directory_operations_total",
        "Directory operations by operation and result"
    );
    describe_histogram!(
        "acf_directory_operation_duration_seconds",
        "Directory command duration in seconds"
    );

    // Provisioning
    describe_counter!(
        "acf_provision_runs_total",
        "Application provisioning runs by result (success/partial)"
    );
    describe_histogram!(
        "acf_provision_duration_seconds",
        "Application provisioning duration in seconds"
    );

    // Temporary access
    describe_counter!(
        "acf_temporary_access_transitions_total",
        "Temporary access lifecycle events"
    );
    describe_counter!("acf_expiration_sweeps_total", "Completed expiration sweeps");

    counter!("acf_provision_runs_total", "result" => "success").absolute(0);
    counter!("acf_provision_runs_total", "result" => "partial").absolute(0);
    counter!("acf_expiration_sweeps_total").absolute(0);
    for event in ["granted", "requested", "approved", "denied", "revoked", "expired"] {
        counter!("acf_temporary_access_transitions_total", "event" => event).absolute(0);
    }
    histogram!("acf_provision_duration_seconds").record(0.0);
}
