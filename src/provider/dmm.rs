//! Real-Debrid 投屏：DMM 目录已包含直链，无需额外解析。

use async_trait::async_trait;
use reqwest::Client;

use super::catalog::{LinkRecord, fetch_catalog};
use super::registry::ProviderDescriptor;
use super::{Provider, ProviderError, delete_cast};
use crate::vfs::VirtualFile;

pub struct DmmProvider {
    descriptor: ProviderDescriptor,
    client: Client,
}

impl DmmProvider {
    pub fn new(descriptor: ProviderDescriptor, client: Client) -> Self {
        Self { descriptor, client }
    }
}

#[async_trait]
impl Provider for DmmProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn list_catalog(&self, token: &str) -> Vec<LinkRecord> {
        fetch_catalog(&self.client, &self.descriptor, token).await
    }

    /// 目录里没有直链的条目按列表中的占位内容返回。
    async fn resolve_content(
        &self,
        _token: &str,
        file: &VirtualFile,
    ) -> Result<String, ProviderError> {
        Ok(file.payload().to_string())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::registry::{ProviderKind, ProviderSettings, descriptor};
    use crate::test_support::{spawn_upstream, test_client};
    use axum::http::StatusCode;
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    fn provider_at(base: String, kind: ProviderKind) -> DmmProvider {
        DmmProvider::new(
            descriptor(
                kind,
                &ProviderSettings {
                    catalog_base: base,
                    ..ProviderSettings::default()
                },
            ),
            test_client(),
        )
    }

    #[tokio::test]
    async fn delete_posts_token_hash_and_imdb() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let recorder = seen.clone();
        let router = Router::new().route(
            "/api/stremio/deletelink",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = Some(body);
                    StatusCode::OK
                }
            }),
        );
        let provider = provider_at(spawn_upstream(router).await, ProviderKind::Dmm);

        provider
            .delete_entry("rd-token", "abc123", "tt0111161")
            .await
            .unwrap();

        let body = seen.lock().unwrap().clone();
        assert_eq!(
            body,
            Some(json!({"token": "rd-token", "imdbId": "tt0111161", "hash": "abc123"}))
        );
    }

    #[tokio::test]
    async fn torbox_style_delete_uses_delete_with_api_key() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let recorder = seen.clone();
        let router = Router::new().route(
            "/api/stremio-tb/deletelink",
            delete(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = Some(body);
                    StatusCode::OK
                }
            }),
        );
        let base = spawn_upstream(router).await;
        let torbox = descriptor(
            ProviderKind::TorBox,
            &ProviderSettings {
                catalog_base: base,
                ..ProviderSettings::default()
            },
        );

        delete_cast(&test_client(), &torbox, "tb-key", "abc", "tt1")
            .await
            .unwrap();

        let body = seen.lock().unwrap().clone();
        assert_eq!(
            body,
            Some(json!({"apiKey": "tb-key", "imdbId": "tt1", "hash": "abc"}))
        );
    }

    #[tokio::test]
    async fn delete_failure_keeps_upstream_status() {
        let router = Router::new().route(
            "/api/stremio/deletelink",
            post(|| async { (StatusCode::FORBIDDEN, "bad token") }),
        );
        let provider = provider_at(spawn_upstream(router).await, ProviderKind::Dmm);

        let result = provider.delete_entry("rd-token", "abc", "tt1").await;
        match result {
            Err(ProviderError::UpstreamStatus { status, body }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
