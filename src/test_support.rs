//! 测试辅助：本地模拟上游 API 与挂载点构造。

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::auth::AuthMode;
use crate::provider::dmm::DmmProvider;
use crate::provider::registry::{ProviderKind, ProviderSettings, descriptor};
use crate::provider::torbox::{ResolutionCache, TorBoxProvider};
use crate::routes::Mount;

/// 在随机端口启动模拟上游，返回其基础 URL。
pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("serve mock upstream");
    });
    format!("http://{addr}")
}

pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build test client")
}

/// 指向模拟目录服务的根挂载点。
pub fn dmm_mount(mode: AuthMode, catalog_base: String) -> Arc<Mount> {
    let descriptor = descriptor(
        ProviderKind::Dmm,
        &ProviderSettings {
            catalog_base,
            ..ProviderSettings::default()
        },
    );
    Arc::new(Mount::new(
        Arc::new(DmmProvider::new(descriptor, test_client())),
        mode,
    ))
}

/// 目录与 TorBox API 都指向同一个模拟上游的 `/torbox/` 挂载点。
pub fn torbox_mount(mode: AuthMode, base: String) -> Arc<Mount> {
    let descriptor = descriptor(
        ProviderKind::TorBox,
        &ProviderSettings {
            catalog_base: base.clone(),
            resolver_base: Some(base),
            ..ProviderSettings::default()
        },
    );
    let cache = Arc::new(ResolutionCache::new(Duration::from_secs(300)));
    Arc::new(Mount::new(
        Arc::new(TorBoxProvider::new(descriptor, test_client(), cache)),
        mode,
    ))
}
