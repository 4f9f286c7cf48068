//! 存活检查处理器。

use axum::response::Json as JsonResponse;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    build_time: &'static str,
}

/// 返回服务状态与构建版本。
pub async fn health() -> JsonResponse<HealthStatus> {
    JsonResponse(HealthStatus {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: crate::build::PKG_VERSION,
        build_time: crate::build::BUILD_TIME,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok_with_version() {
        let JsonResponse(status) = health().await;
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
