use std::net::SocketAddr;

// ── Mutations ───────────────────────────────────────────────────

/// Counter: store mutations. Labels: op, status (ok, rejected, rolled_back, out_of_sync).
pub const MUTATIONS_TOTAL: &str = "roomdesk_mutations_total";

/// Counter: local mutations undone after a failed persist. Labels: op.
pub const ROLLBACKS_TOTAL: &str = "roomdesk_rollbacks_total";

/// Counter: cancellations removed locally but still present remotely.
pub const OUT_OF_SYNC_TOTAL: &str = "roomdesk_out_of_sync_total";

/// Gauge: reservations held in the local cache.
pub const RESERVATIONS_CACHED: &str = "roomdesk_reservations_cached";

// ── Remote calls ────────────────────────────────────────────────

/// Histogram: remote call latency in seconds. Labels: op.
pub const REMOTE_CALL_DURATION_SECONDS: &str = "roomdesk_remote_call_duration_seconds";

/// Counter: failed remote calls, each attempt counted. Labels: op.
pub const SYNC_FAILURES_TOTAL: &str = "roomdesk_sync_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
