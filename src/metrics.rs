use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, TextEncoder, opts, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

pub static ADMISSION_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "medalstream_admission_rejected_total",
        "Requests rejected by the admission limiter"
    ))
    .expect("admission counter registers once")
});

pub static VALIDATION_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "medalstream_validation_failures_total",
            "Mutations refused because a referenced record failed its check"
        ),
        &["entity"]
    )
    .expect("validation counter registers once")
});

pub static LOGINS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "medalstream_logins_total",
        "Successful logins (token pairs issued)"
    ))
    .expect("login counter registers once")
});

pub static REFRESH_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "medalstream_refresh_rejected_total",
        "Signature-valid refresh tokens that were no longer live (rotated out, logged out or expired)"
    ))
    .expect("refresh counter registers once")
});

pub static LIVE_RELAY_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!(
        "medalstream_live_relay_connections",
        "Open live relay websocket connections"
    ))
    .expect("relay gauge registers once")
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
