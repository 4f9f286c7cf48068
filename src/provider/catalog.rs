//! 上游投屏目录拉取与归一化。

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::registry::ProviderDescriptor;
use crate::vfs::pointer_filename;

pub const UNKNOWN_FILENAME: &str = "Unknown";
pub const UNRESOLVED_URL: &str = "#";

/// 归一化后的目录条目。
#[derive(Clone, Debug, PartialEq)]
pub struct LinkRecord {
    /// 尚未解析为直链时为 `None`。
    pub url: Option<String>,
    pub filename: String,
    pub strm_filename: String,
    pub size_gb: String,
    pub updated_at: DateTime<Utc>,
    pub hash: String,
    pub imdb_id: String,
}

impl LinkRecord {
    pub fn display_url(&self) -> &str {
        self.url.as_deref().unwrap_or(UNRESOLVED_URL)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawLink {
    #[serde(alias = "link")]
    url: Option<String>,
    #[serde(alias = "name")]
    filename: Option<String>,
    hash: Option<String>,
    #[serde(alias = "imdb_id")]
    imdb_id: Option<String>,
    size: Option<Value>,
    #[serde(alias = "updated_at")]
    updated_at: Option<Value>,
}

/// 上游目录负载的几种已知形态。
#[derive(Debug, PartialEq)]
pub enum CatalogPayload {
    List(Vec<Value>),
    Wrapped(&'static str, Vec<Value>),
    Unrecognized(String),
}

const WRAPPER_KEYS: [&str; 3] = ["links", "items", "data"];

impl CatalogPayload {
    /// 依次尝试：裸数组、`links`、`items`、`data`。
    pub fn parse(value: Value) -> Self {
        match value {
            Value::Array(items) => CatalogPayload::List(items),
            Value::Object(mut object) => {
                for key in WRAPPER_KEYS {
                    if let Some(Value::Array(items)) = object.remove(key) {
                        return CatalogPayload::Wrapped(key, items);
                    }
                }
                let keys: Vec<&str> = object.keys().map(String::as_str).collect();
                CatalogPayload::Unrecognized(format!("object with keys [{}]", keys.join(", ")))
            }
            Value::Null => CatalogPayload::Unrecognized("null".into()),
            Value::Bool(_) => CatalogPayload::Unrecognized("boolean".into()),
            Value::Number(_) => CatalogPayload::Unrecognized("number".into()),
            Value::String(_) => CatalogPayload::Unrecognized("string".into()),
        }
    }
}

#[derive(Error, Debug)]
enum CatalogError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status {0}")]
    Status(StatusCode),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized payload shape: {0}")]
    Shape(String),
}

/// 按 (端点, 参数名) 顺序尝试拉取目录，首个成功即返回。
///
/// 所有尝试失败时记录日志并返回空列表。
pub async fn fetch_catalog(
    client: &Client,
    descriptor: &ProviderDescriptor,
    token: &str,
) -> Vec<LinkRecord> {
    let provider = descriptor.kind.id();
    for (url, key) in descriptor.catalog_attempts() {
        match fetch_attempt(client, &url, key, token).await {
            Ok(entries) => {
                let records = normalize_records(entries);
                debug!(provider, url, key, count = records.len(), "catalog fetched");
                return records;
            }
            Err(CatalogError::Shape(shape)) => {
                warn!(provider, url, key, shape, "catalog payload shape not recognized");
            }
            Err(err) => {
                warn!(provider, url, key, error = %err, "catalog request failed");
            }
        }
    }
    warn!(provider, "all catalog endpoints failed, showing no links");
    Vec::new()
}

async fn fetch_attempt(
    client: &Client,
    url: &str,
    key: &str,
    token: &str,
) -> Result<Vec<Value>, CatalogError> {
    let response = client.get(url).query(&[(key, token)]).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::Status(status));
    }
    let body = response.text().await?;
    let value: Value = serde_json::from_str(&body)?;
    match CatalogPayload::parse(value) {
        CatalogPayload::List(items) => Ok(items),
        CatalogPayload::Wrapped(wrapper, items) => {
            debug!(url, wrapper, "catalog payload is wrapped");
            Ok(items)
        }
        CatalogPayload::Unrecognized(shape) => Err(CatalogError::Shape(shape)),
    }
}

/// 转换原始条目并按更新时间倒序排列（稳定排序）。
pub fn normalize_records(entries: Vec<Value>) -> Vec<LinkRecord> {
    let mut records: Vec<LinkRecord> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawLink>(entry) {
            Ok(raw) => Some(raw),
            Err(err) => {
                debug!(error = %err, "skip malformed catalog entry");
                None
            }
        })
        .map(into_record)
        .collect();
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    records
}

fn into_record(raw: RawLink) -> LinkRecord {
    let url = raw
        .url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    let filename = display_filename(raw.filename.as_deref(), url.as_deref());
    let hash = raw.hash.unwrap_or_default();
    let imdb_id = raw.imdb_id.unwrap_or_default();
    LinkRecord {
        strm_filename: pointer_filename(&filename, &hash, &imdb_id),
        size_gb: format_size_gb(raw.size.as_ref().and_then(number_value)),
        updated_at: raw
            .updated_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        url,
        filename,
        hash,
        imdb_id,
    }
}

fn display_filename(name: Option<&str>, url: Option<&str>) -> String {
    if let Some(name) = name
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != UNKNOWN_FILENAME)
    {
        return name.to_string();
    }
    url.and_then(filename_from_url)
        .unwrap_or_else(|| UNKNOWN_FILENAME.to_string())
}

/// 取 URL 路径最后一段并做百分号解码。
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let decoded = urlencoding::decode(segment).ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}

/// 上游大小单位为 MB，转换为保留一位小数的 GB。
pub fn format_size_gb(size_mb: Option<f64>) -> String {
    match size_mb {
        Some(mb) if mb > 0.0 => format!("{:.1}", (mb / 1024.0 * 10.0).round() / 10.0),
        _ => "0.0".to_string(),
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::registry::{ProviderKind, ProviderSettings, descriptor};
    use crate::test_support::{spawn_upstream, test_client};
    use axum::extract::Query;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn payload_shapes_are_recognized() {
        assert!(matches!(
            CatalogPayload::parse(json!([{"hash": "a"}])),
            CatalogPayload::List(items) if items.len() == 1
        ));
        assert!(matches!(
            CatalogPayload::parse(json!({"items": [], "total": 0})),
            CatalogPayload::Wrapped("items", _)
        ));
        assert!(matches!(
            CatalogPayload::parse(json!({"success": true, "data": [{}]})),
            CatalogPayload::Wrapped("data", _)
        ));
        assert_eq!(
            CatalogPayload::parse(json!({"error": "bad token"})),
            CatalogPayload::Unrecognized("object with keys [error]".into())
        );
        assert!(matches!(
            CatalogPayload::parse(json!({"links": "nope"})),
            CatalogPayload::Unrecognized(_)
        ));
    }

    #[test]
    fn size_is_converted_to_gigabytes() {
        assert_eq!(format_size_gb(Some(2048.0)), "2.0");
        assert_eq!(format_size_gb(Some(1536.0)), "1.5");
        assert_eq!(format_size_gb(Some(100.0)), "0.1");
        assert_eq!(format_size_gb(None), "0.0");
    }

    #[test]
    fn filename_falls_back_to_url_segment() {
        let records = normalize_records(vec![
            json!({
                "url": "https://cdn.example/dl/ABC/The%20Movie.mkv",
                "filename": "Unknown",
                "hash": "abc",
                "imdbId": "tt1",
                "size": 2048,
                "updatedAt": "2025-01-01T00:00:00.000Z"
            }),
            json!({"hash": "def", "imdbId": "tt2"}),
        ]);
        assert_eq!(records[0].filename, "The Movie.mkv");
        assert_eq!(records[0].strm_filename, "The Movie.mkv{hash-abc}{imdb-tt1}.strm");
        assert_eq!(records[0].size_gb, "2.0");
        assert_eq!(records[1].filename, UNKNOWN_FILENAME);
        assert_eq!(records[1].display_url(), UNRESOLVED_URL);
    }

    #[test]
    fn records_are_sorted_newest_first() {
        let records = normalize_records(vec![
            json!({"filename": "old", "updatedAt": "2024-01-01T00:00:00Z"}),
            json!({"filename": "new", "updatedAt": "2025-06-01T00:00:00Z"}),
            json!({"filename": "mid", "updatedAt": 1717200000000i64}),
        ]);
        let names: Vec<_> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn fetch_falls_back_through_endpoints_and_keys() {
        let router = Router::new()
            .route("/api/stremio-tb/links", get(|| async { AxumStatus::NOT_FOUND }))
            .route(
                "/api/stremio/tb/links",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    if query.get("token").map(String::as_str) == Some("secret") {
                        Json(json!({"data": [
                            {"filename": "a.mkv", "hash": "h1", "imdbId": "tt1", "updatedAt": "2025-01-01T00:00:00Z"},
                            {"filename": "b.mkv", "hash": "h2", "imdbId": "tt2", "updatedAt": "2025-02-01T00:00:00Z"}
                        ]}))
                    } else {
                        Json(json!({"error": "missing token"}))
                    }
                }),
            );
        let base = spawn_upstream(router).await;
        let descriptor = descriptor(
            ProviderKind::TorBox,
            &ProviderSettings {
                catalog_base: base,
                ..ProviderSettings::default()
            },
        );

        let records = fetch_catalog(&test_client(), &descriptor, "secret").await;
        let names: Vec<_> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["b.mkv", "a.mkv"]);
    }

    #[tokio::test]
    async fn fetch_failure_yields_empty_catalog() {
        let router = Router::new().route(
            "/api/stremio/links",
            get(|| async { (AxumStatus::OK, "not json") }),
        );
        let base = spawn_upstream(router).await;
        let descriptor = descriptor(
            ProviderKind::Dmm,
            &ProviderSettings {
                catalog_base: base,
                ..ProviderSettings::default()
            },
        );

        assert!(fetch_catalog(&test_client(), &descriptor, "secret").await.is_empty());
    }
}
