//! 提供方抽象：目录拉取、内容解析与删除。

pub mod catalog;
pub mod dmm;
pub mod registry;
pub mod torbox;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::vfs::VirtualFile;
use catalog::LinkRecord;
use registry::{DeleteStyle, ProviderDescriptor};

/// 上游解析或删除失败。
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("upstream rejected request: {0}")]
    Rejected(String),

    #[error("unexpected upstream response: {0}")]
    UnexpectedResponse(String),

    #[error("torrent has no files")]
    NoFiles,

    #[error("no direct link available for {0}")]
    Unresolved(String),
}

/// 每个提供方实现一套能力，协议层对具体提供方无感知。
#[async_trait]
pub trait Provider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    /// 拉取目录，按更新时间倒序；任何失败都返回空列表。
    async fn list_catalog(&self, token: &str) -> Vec<LinkRecord>;

    /// 返回指针文件的实际内容（直链）。
    async fn resolve_content(&self, token: &str, file: &VirtualFile)
    -> Result<String, ProviderError>;

    async fn delete_entry(
        &self,
        token: &str,
        hash: &str,
        external_id: &str,
    ) -> Result<(), ProviderError>;
}

/// 将非 2xx 响应转换为 `UpstreamStatus`。
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::UpstreamStatus { status, body })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    imdb_id: &'a str,
    hash: &'a str,
}

/// 调用提供方的删除接口，方法与凭据字段由描述决定。
pub(crate) async fn delete_cast(
    client: &Client,
    descriptor: &ProviderDescriptor,
    token: &str,
    hash: &str,
    external_id: &str,
) -> Result<(), ProviderError> {
    let url = descriptor.delete_url();
    let request = match descriptor.delete_style {
        DeleteStyle::PostToken => client.post(&url).json(&DeletePayload {
            token: Some(token),
            api_key: None,
            imdb_id: external_id,
            hash,
        }),
        DeleteStyle::DeleteApiKey => client.delete(&url).json(&DeletePayload {
            token: None,
            api_key: Some(token),
            imdb_id: external_id,
            hash,
        }),
    };
    ensure_success(request.send().await?).await?;
    info!(
        provider = descriptor.kind.id(),
        imdb_id = external_id,
        hash,
        "cast deleted"
    );
    Ok(())
}
