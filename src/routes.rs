//! 按挂载点组装路由：每个提供方一套 WebDAV、登录与登出路由。

use axum::extract::Extension;
use axum::routing::{any, get, post};
use axum::{Router, middleware};
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{self, AuthMode, MountAuth};
use crate::config::Args;
use crate::provider::Provider;
use crate::provider::dmm::DmmProvider;
use crate::provider::registry::{ProviderDescriptor, ProviderKind, descriptor};
use crate::provider::torbox::{ResolutionCache, TorBoxProvider};
use crate::webdav;

/// 一个挂载点：提供方实现及其认证设置。
pub struct Mount {
    pub auth: MountAuth,
    pub provider: Arc<dyn Provider>,
}

impl Mount {
    pub fn new(provider: Arc<dyn Provider>, mode: AuthMode) -> Self {
        let auth = MountAuth::new(provider.descriptor(), mode);
        Self { auth, provider }
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        self.provider.descriptor()
    }

    pub fn id(&self) -> &'static str {
        self.descriptor().kind.id()
    }

    /// 以 `/` 结尾的挂载路径。
    pub fn path(&self) -> &'static str {
        self.descriptor().mount
    }

    /// Cookie 路径不带结尾斜杠，使 `/torbox` 与 `/torbox/...` 都能携带。
    pub fn cookie_path(&self) -> &'static str {
        let path = self.path();
        if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        }
    }
}

/// 为注册表中的每个提供方创建挂载点。
pub fn build_mounts(args: &Args, client: &Client, cache: &Arc<ResolutionCache>) -> Vec<Arc<Mount>> {
    ProviderKind::ALL
        .iter()
        .map(|&kind| {
            let settings = args.provider_settings(kind);
            let descriptor = descriptor(kind, &settings);
            let mode = AuthMode::from_settings(&descriptor, &settings);
            match &mode {
                AuthMode::SingleUser { .. } => {
                    info!(provider = kind.id(), mount = descriptor.mount, "single-user mode")
                }
                AuthMode::MultiUser => {
                    info!(provider = kind.id(), mount = descriptor.mount, "multi-user mode")
                }
                AuthMode::Misconfigured { missing } => warn!(
                    provider = kind.id(),
                    missing, "partial credentials configured, mount will answer 500"
                ),
            }
            let provider: Arc<dyn Provider> = match kind {
                ProviderKind::Dmm => Arc::new(DmmProvider::new(descriptor, client.clone())),
                ProviderKind::TorBox => Arc::new(TorBoxProvider::new(
                    descriptor,
                    client.clone(),
                    cache.clone(),
                )),
            };
            Arc::new(Mount::new(provider, mode))
        })
        .collect()
}

/// 构建单个挂载点的路由。
pub fn mount_router(mount: Arc<Mount>) -> Router {
    let base = mount.path();
    let mut router = Router::new()
        .route(base, any(webdav::collection_handler))
        .route(&format!("{base}login"), post(auth::login))
        .route(&format!("{base}logout"), get(auth::logout))
        .route(&format!("{base}{{filename}}"), any(webdav::file_handler));
    if base.len() > 1 {
        router = router.route(base.trim_end_matches('/'), any(webdav::collection_handler));
    }
    router
        .layer(middleware::from_fn(auth::require_configuration))
        .layer(Extension(mount))
}
