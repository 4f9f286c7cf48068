//! 嵌入式静态资源（`public/`）。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rust_embed::{EmbeddedFile, RustEmbed};
use std::time::SystemTime;

use crate::error::ApiError;
use crate::webdav::DavEntry;

#[derive(RustEmbed)]
#[folder = "public"]
/// 嵌入式页面资源。
pub struct PublicAssets;

/// 资源缺少修改时间时使用的固定时间（2025-12-12T00:00:00Z）。
const ASSET_FALLBACK_MODIFIED: i64 = 1_765_497_600;

/// PROPFIND 列表中展示的资源扩展名。
const LISTED_EXTENSION: &str = ".png";

fn asset_modified(asset: &EmbeddedFile) -> DateTime<Utc> {
    asset
        .metadata
        .last_modified()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .or_else(|| DateTime::<Utc>::from_timestamp(ASSET_FALLBACK_MODIFIED, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn mime_of(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// 加载顶层嵌入资源，不存在时返回 `None`。
pub fn serve_asset(name: &str) -> Result<Option<Response>, ApiError> {
    if name.contains('/') {
        return Ok(None);
    }
    let Some(asset) = PublicAssets::get(name) else {
        return Ok(None);
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&mime_of(name))
            .map_err(|_| ApiError::Internal("invalid asset mime type".into()))?,
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );
    let modified = httpdate::fmt_http_date(SystemTime::from(asset_modified(&asset)));
    if let Ok(value) = HeaderValue::from_str(&modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    Ok(Some(
        (headers, AxumBody::from(asset.data.into_owned())).into_response(),
    ))
}

/// 目录列表中附带的图片资源，按名称排序。
pub fn listed_assets() -> Vec<DavEntry> {
    let mut entries: Vec<DavEntry> = PublicAssets::iter()
        .filter(|path| path.ends_with(LISTED_EXTENSION) && !path.contains('/'))
        .filter_map(|path| {
            let asset = PublicAssets::get(&path)?;
            Some(DavEntry {
                name: path.to_string(),
                length: asset.data.len() as u64,
                last_modified: asset_modified(&asset),
                content_type: mime_of(&path),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}
