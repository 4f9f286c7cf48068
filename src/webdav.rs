//! 只读 WebDAV 适配：PROPFIND 列表、GET/HEAD 读取指针文件、DELETE 删除投屏。

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use crate::error::ApiError;
use crate::frontend;
use crate::http::request_origin;
use crate::pages;
use crate::routes::Mount;
use crate::vfs::{
    POINTER_CONTENT_TYPE, VirtualFile, encode_href_name, is_pointer_filename,
    parse_pointer_filename, synthesize,
};

const DAV_PREFIX: &str = "D";
const DAV_NAMESPACE: &str = "DAV:";
const MULTISTATUS_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const STATUS_OK: &str = "HTTP/1.1 200 OK";
const ALLOWED_METHODS: &str = "OPTIONS, GET, HEAD, PROPFIND, DELETE";

/// 多状态响应中的一个文件条目。
#[derive(Clone, Debug, PartialEq)]
pub struct DavEntry {
    pub name: String,
    pub length: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: String,
}

impl From<&VirtualFile> for DavEntry {
    fn from(file: &VirtualFile) -> Self {
        Self {
            name: file.name.clone(),
            length: file.content_length(),
            last_modified: file.last_modified,
            content_type: file.content_type().to_string(),
        }
    }
}

/// 挂载点根路径：浏览页、PROPFIND 与 OPTIONS。
pub async fn collection_handler(
    Extension(mount): Extension<Arc<Mount>>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match method.as_str() {
        "PROPFIND" => propfind_collection(&mount, &headers).await,
        "GET" | "HEAD" => Ok(browse(&mount, &headers).await),
        "OPTIONS" => Ok(options_response()),
        _ => Err(ApiError::MethodNotAllowed),
    }
}

/// 挂载点下的单个文件。
pub async fn file_handler(
    Extension(mount): Extension<Arc<Mount>>,
    method: Method,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match method.as_str() {
        "GET" | "HEAD" => get_file(&mount, &filename, &headers).await,
        "DELETE" => delete_file(&mount, &filename, &headers).await,
        "PROPFIND" => propfind_file(&mount, &filename, &headers).await,
        "OPTIONS" => Ok(options_response()),
        _ => Err(ApiError::MethodNotAllowed),
    }
}

async fn browse(mount: &Mount, headers: &HeaderMap) -> Response {
    let origin = request_origin(headers);
    match mount.auth.resolve_token(headers) {
        Some(token) => {
            let records = mount.provider.list_catalog(&token).await;
            Html(pages::browse(mount, &records, &origin)).into_response()
        }
        None => Html(pages::login_page(mount, &origin)).into_response(),
    }
}

async fn current_files(mount: &Mount, token: &str) -> Vec<VirtualFile> {
    let records = mount.provider.list_catalog(token).await;
    synthesize(&records)
}

/// 缺省 `Depth` 按 `0` 处理，只返回集合本身。
fn wants_children(headers: &HeaderMap) -> bool {
    headers
        .get("depth")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .is_some_and(|depth| depth != "0")
}

async fn propfind_collection(mount: &Mount, headers: &HeaderMap) -> Result<Response, ApiError> {
    let token = mount.auth.require_token(headers)?;
    let mut entries = Vec::new();
    if wants_children(headers) {
        entries.extend(current_files(mount, &token).await.iter().map(DavEntry::from));
        entries.extend(frontend::listed_assets());
    }
    debug!(provider = mount.id(), entries = entries.len(), "propfind collection");
    let body = render_multistatus(mount.path(), &entries, Some(Utc::now()))?;
    Ok(multistatus_response(body))
}

async fn propfind_file(
    mount: &Mount,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let token = mount.auth.require_token(headers)?;
    let entry = if is_pointer_filename(filename) {
        current_files(mount, &token)
            .await
            .iter()
            .find(|file| file.name == filename)
            .map(DavEntry::from)
    } else {
        frontend::listed_assets()
            .into_iter()
            .find(|asset| asset.name == filename)
    };
    let entry = entry.ok_or_else(|| ApiError::NotFound("File not found".into()))?;
    let body = render_multistatus(mount.path(), &[entry], None)?;
    Ok(multistatus_response(body))
}

async fn get_file(mount: &Mount, filename: &str, headers: &HeaderMap) -> Result<Response, ApiError> {
    if let Some(response) = frontend::serve_asset(filename)? {
        return Ok(response);
    }
    if !is_pointer_filename(filename) {
        return Err(ApiError::NotFound("File not found".into()));
    }

    let token = mount.auth.require_token(headers)?;
    let files = current_files(mount, &token).await;
    let file = files
        .iter()
        .find(|file| file.name == filename)
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;
    let url = mount
        .provider
        .resolve_content(&token, file)
        .await
        .map_err(|err| {
            warn!(provider = mount.id(), filename, error = %err, "failed to resolve pointer file");
            ApiError::resolution(err)
        })?;
    Ok(([(header::CONTENT_TYPE, POINTER_CONTENT_TYPE)], url).into_response())
}

async fn delete_file(
    mount: &Mount,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let token = mount.auth.require_token(headers)?;
    let Some((hash, imdb_id)) = parse_pointer_filename(filename) else {
        warn!(provider = mount.id(), filename, "delete rejected: no hash or imdb in filename");
        return Err(ApiError::BadRequest(
            "Invalid filename format - missing hash or imdbId encoding".into(),
        ));
    };

    info!(provider = mount.id(), hash, imdb_id, "deleting casted link");
    mount
        .provider
        .delete_entry(&token, &hash, &imdb_id)
        .await
        .map_err(|err| {
            warn!(provider = mount.id(), hash, imdb_id, error = %err, "delete failed");
            ApiError::delete_failed(err)
        })?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn options_response() -> Response {
    (
        StatusCode::OK,
        [
            ("dav", "1"),
            ("allow", ALLOWED_METHODS),
            ("ms-author-via", "DAV"),
        ],
    )
        .into_response()
}

fn multistatus_response(body: String) -> Response {
    let mut response = (StatusCode::MULTI_STATUS, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(MULTISTATUS_CONTENT_TYPE),
    );
    response
}

fn dav_element(name: &str) -> Element {
    let mut element = Element::new(name);
    element.prefix = Some(DAV_PREFIX.to_string());
    element.namespace = Some(DAV_NAMESPACE.to_string());
    element
}

fn dav_text(name: &str, text: impl Into<String>) -> Element {
    let mut element = dav_element(name);
    element.children.push(XMLNode::Text(text.into()));
    element
}

fn dav_parent(name: &str, children: Vec<Element>) -> Element {
    let mut element = dav_element(name);
    element
        .children
        .extend(children.into_iter().map(XMLNode::Element));
    element
}

fn http_date(time: DateTime<Utc>) -> String {
    httpdate::fmt_http_date(SystemTime::from(time))
}

fn response_element(href: String, props: Vec<Element>) -> Element {
    dav_parent(
        "response",
        vec![
            dav_text("href", href),
            dav_parent(
                "propstat",
                vec![dav_parent("prop", props), dav_text("status", STATUS_OK)],
            ),
        ],
    )
}

fn file_response(base: &str, entry: &DavEntry) -> Element {
    response_element(
        format!("{base}{}", encode_href_name(&entry.name)),
        vec![
            dav_text("displayname", entry.name.clone()),
            dav_element("resourcetype"),
            dav_text("getcontentlength", entry.length.to_string()),
            dav_text("getlastmodified", http_date(entry.last_modified)),
            dav_text("getcontenttype", entry.content_type.clone()),
        ],
    )
}

fn collection_response(base: &str, modified: DateTime<Utc>) -> Element {
    response_element(
        base.to_string(),
        vec![
            dav_parent("resourcetype", vec![dav_element("collection")]),
            dav_text("getlastmodified", http_date(modified)),
        ],
    )
}

/// 生成多状态 XML：先文件条目，`collection` 给定时最后附上集合本身。
fn render_multistatus(
    base: &str,
    entries: &[DavEntry],
    collection: Option<DateTime<Utc>>,
) -> Result<String, ApiError> {
    let mut root = dav_parent(
        "multistatus",
        entries
            .iter()
            .map(|entry| file_response(base, entry))
            .collect(),
    );
    if let Some(modified) = collection {
        root.children
            .push(XMLNode::Element(collection_response(base, modified)));
    }
    let mut namespaces = Namespace::empty();
    namespaces.put(DAV_PREFIX, DAV_NAMESPACE);
    root.namespaces = Some(namespaces);

    let mut buffer = Vec::new();
    root.write_with_config(&mut buffer, EmitterConfig::new().perform_indent(true))
        .map_err(|err| ApiError::Internal(format!("failed to render multistatus: {err}")))?;
    String::from_utf8(buffer)
        .map_err(|err| ApiError::Internal(format!("multistatus is not utf-8: {err}")))
}
