use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

pub const SERVICE_NAME: &str = "balanced-life-api";

/// Liveness only; touches no dependencies.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
