//! TorBox：目录只带内容哈希，GET 时再按 哈希 -> 种子 -> 文件 -> 直链 解析。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::catalog::{LinkRecord, fetch_catalog};
use super::registry::ProviderDescriptor;
use super::{Provider, ProviderError, delete_cast, ensure_success};
use crate::cache::TtlMap;
use crate::vfs::{PointerContent, VirtualFile};

/// 种子内的单个文件。
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TorrentFile {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    detail: Option<String>,
    error: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct CreatedTorrent {
    torrent_id: Option<u64>,
}

#[derive(Deserialize)]
struct TorrentInfo {
    #[serde(default)]
    files: Vec<TorrentFile>,
}

/// (提供方, 令牌, 内容哈希)
pub type TorrentKey = (&'static str, String, String);
/// (提供方, 令牌, 种子 ID)
pub type FilesKey = (&'static str, String, u64);
/// (提供方, 令牌, 种子 ID, 文件 ID)
pub type LinkKey = (&'static str, String, u64, u64);

/// 三段解析流水线的缓存：种子登记、文件列表、直链签发。
#[derive(Debug)]
pub struct ResolutionCache {
    pub torrent_ids: TtlMap<TorrentKey, u64>,
    pub files: TtlMap<FilesKey, Vec<TorrentFile>>,
    pub links: TtlMap<LinkKey, String>,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            torrent_ids: TtlMap::new(ttl),
            files: TtlMap::new(ttl),
            links: TtlMap::new(ttl),
        }
    }
}

pub struct TorBoxProvider {
    descriptor: ProviderDescriptor,
    client: Client,
    cache: Arc<ResolutionCache>,
    api_base: String,
}

impl TorBoxProvider {
    pub fn new(descriptor: ProviderDescriptor, client: Client, cache: Arc<ResolutionCache>) -> Self {
        let api_base = descriptor
            .resolver_base
            .clone()
            .unwrap_or_else(|| crate::config::DEFAULT_TORBOX_API_URL.to_string());
        Self {
            descriptor,
            client,
            cache,
            api_base,
        }
    }

    /// 以仅缓存模式登记磁力链接，返回种子 ID。
    async fn register_torrent(&self, token: &str, hash: &str) -> Result<u64, ProviderError> {
        let magnet = format!("magnet:?xt=urn:btih:{hash}");
        let response = self
            .client
            .post(format!("{}/torrents/createtorrent", self.api_base))
            .bearer_auth(token)
            .form(&[("magnet", magnet.as_str()), ("add_only_if_cached", "true")])
            .send()
            .await?;
        let created: CreatedTorrent = read_envelope(response, "createtorrent").await?;
        let torrent_id = created.torrent_id.ok_or_else(|| {
            ProviderError::UnexpectedResponse("createtorrent: missing torrent_id".into())
        })?;
        debug!(hash, torrent_id, "torrent registered");
        Ok(torrent_id)
    }

    async fn list_files(&self, token: &str, torrent_id: u64) -> Result<Vec<TorrentFile>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/torrents/mylist", self.api_base))
            .bearer_auth(token)
            .query(&[("id", torrent_id.to_string().as_str()), ("bypass_cache", "true")])
            .send()
            .await?;
        let info: TorrentInfo = read_envelope(response, "mylist").await?;
        Ok(info.files)
    }

    async fn request_link(
        &self,
        token: &str,
        torrent_id: u64,
        file_id: u64,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(format!("{}/torrents/requestdl", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("token", token),
                ("torrent_id", torrent_id.to_string().as_str()),
                ("file_id", file_id.to_string().as_str()),
                ("redirect", "false"),
            ])
            .send()
            .await?;
        read_envelope(response, "requestdl").await
    }

    async fn resolve_hash(
        &self,
        token: &str,
        hash: &str,
        filename: &str,
    ) -> Result<String, ProviderError> {
        let provider = self.descriptor.kind.id();
        let torrent_id = self
            .cache
            .torrent_ids
            .get_or_try_insert_with((provider, token.to_string(), hash.to_string()), || {
                self.register_torrent(token, hash)
            })
            .await?;
        let files = self
            .cache
            .files
            .get_or_try_insert_with((provider, token.to_string(), torrent_id), || {
                self.list_files(token, torrent_id)
            })
            .await?;
        let file = select_file(&files, filename).ok_or(ProviderError::NoFiles)?;
        let file_id = file.id;
        self.cache
            .links
            .get_or_try_insert_with((provider, token.to_string(), torrent_id, file_id), || {
                self.request_link(token, torrent_id, file_id)
            })
            .await
    }
}

#[async_trait]
impl Provider for TorBoxProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn list_catalog(&self, token: &str) -> Vec<LinkRecord> {
        fetch_catalog(&self.client, &self.descriptor, token).await
    }

    async fn resolve_content(
        &self,
        token: &str,
        file: &VirtualFile,
    ) -> Result<String, ProviderError> {
        match &file.content {
            PointerContent::Direct(url) => Ok(url.clone()),
            PointerContent::Deferred if file.hash.is_empty() => {
                Err(ProviderError::Unresolved(file.name.clone()))
            }
            PointerContent::Deferred => {
                info!(hash = %file.hash, filename = %file.original_filename, "resolving torbox link");
                self.resolve_hash(token, &file.hash, &file.original_filename)
                    .await
            }
        }
    }

    async fn delete_entry(
        &self,
        token: &str,
        hash: &str,
        external_id: &str,
    ) -> Result<(), ProviderError> {
        delete_cast(&self.client, &self.descriptor, token, hash, external_id).await
    }
}

/// 选择文件：名称或短名称精确匹配 > 短名称后缀匹配 > 第一个文件。
pub fn select_file<'a>(files: &'a [TorrentFile], filename: &str) -> Option<&'a TorrentFile> {
    files
        .iter()
        .find(|file| file.name == filename || file.short_name == filename)
        .or_else(|| {
            files.iter().find(|file| {
                !file.short_name.is_empty()
                    && (filename.ends_with(&file.short_name) || file.short_name.ends_with(filename))
            })
        })
        .or_else(|| files.first())
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    stage: &str,
) -> Result<T, ProviderError> {
    let body = ensure_success(response).await?.text().await?;
    let envelope: Envelope<T> = serde_json::from_str(&body)
        .map_err(|err| ProviderError::UnexpectedResponse(format!("{stage}: {err}")))?;
    if !envelope.success {
        let detail = envelope
            .detail
            .or(envelope.error)
            .unwrap_or_else(|| format!("{stage} failed"));
        return Err(ProviderError::Rejected(detail));
    }
    envelope
        .data
        .ok_or_else(|| ProviderError::UnexpectedResponse(format!("{stage}: missing data")))
}
