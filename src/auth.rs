//! 凭据解析、登录会话与配置校验。
//!
//! 会话 Cookie 直接保存上游令牌，服务端不维护用户表。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Form};
use axum::http::{HeaderMap, Request};
use axum::middleware;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::{Authorization, HeaderMapExt};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::SESSION_COOKIE_MAX_AGE_DAYS;
use crate::error::ApiError;
use crate::http::request_origin;
use crate::pages;
use crate::provider::registry::{ProviderDescriptor, ProviderSettings};
use crate::routes::Mount;

/// 单用户 / 多用户模式。
#[derive(Clone, Debug, PartialEq)]
pub enum AuthMode {
    /// 运维方配置了固定令牌与用户名密码。
    SingleUser {
        token: String,
        username: String,
        password: String,
    },
    /// 用户名为别名之一，密码即上游令牌。
    MultiUser,
    /// 只配置了部分变量。
    Misconfigured { missing: &'static str },
}

impl AuthMode {
    pub fn from_settings(descriptor: &ProviderDescriptor, settings: &ProviderSettings) -> Self {
        match (&settings.token, &settings.username, &settings.password) {
            (Some(token), Some(username), Some(password)) => AuthMode::SingleUser {
                token: token.clone(),
                username: username.clone(),
                password: password.clone(),
            },
            (None, None, None) => AuthMode::MultiUser,
            (token, username, _) => {
                let missing = if token.is_none() {
                    descriptor.token_env
                } else if username.is_none() {
                    descriptor.username_env
                } else {
                    descriptor.password_env
                };
                AuthMode::Misconfigured { missing }
            }
        }
    }

    pub fn is_single_user(&self) -> bool {
        matches!(self, AuthMode::SingleUser { .. })
    }
}

/// 按顺序尝试的凭据来源，首个成功者生效。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    SessionCookie,
    BasicAuth,
}

pub const CREDENTIAL_SOURCES: [CredentialSource; 2] =
    [CredentialSource::SessionCookie, CredentialSource::BasicAuth];

impl CredentialSource {
    fn extract(self, auth: &MountAuth, headers: &HeaderMap) -> Option<String> {
        match self {
            CredentialSource::SessionCookie => CookieJar::from_headers(headers)
                .get(auth.cookie_name)
                .map(|cookie| cookie.value().to_string())
                .filter(|value| !value.is_empty()),
            CredentialSource::BasicAuth => {
                let basic = headers.typed_get::<Authorization<Basic>>()?;
                auth.verify(basic.username(), basic.password())
            }
        }
    }
}

/// 单个挂载点的认证设置。
#[derive(Debug)]
pub struct MountAuth {
    pub realm: &'static str,
    pub cookie_name: &'static str,
    pub usernames: &'static [&'static str],
    pub mode: AuthMode,
}

impl MountAuth {
    pub fn new(descriptor: &ProviderDescriptor, mode: AuthMode) -> Self {
        Self {
            realm: descriptor.name,
            cookie_name: descriptor.cookie_name,
            usernames: descriptor.usernames,
            mode,
        }
    }

    /// 校验用户名与密码，成功时返回上游令牌。
    pub fn verify(&self, username: &str, password: &str) -> Option<String> {
        match &self.mode {
            AuthMode::SingleUser {
                token,
                username: expected_user,
                password: expected_pass,
            } => (username == expected_user && password == expected_pass).then(|| token.clone()),
            AuthMode::MultiUser => (self.usernames.contains(&username) && !password.is_empty())
                .then(|| password.to_string()),
            AuthMode::Misconfigured { .. } => None,
        }
    }

    /// 依次尝试 Cookie 与 Basic 认证。
    pub fn resolve_token(&self, headers: &HeaderMap) -> Option<String> {
        CREDENTIAL_SOURCES
            .iter()
            .find_map(|source| source.extract(self, headers))
    }

    /// 无凭据时返回带质询头的 401。
    pub fn require_token(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        self.resolve_token(headers)
            .ok_or_else(|| ApiError::challenge(self.realm))
    }

    /// 登录页默认用户名。
    pub fn default_username(&self) -> &str {
        match &self.mode {
            AuthMode::SingleUser { .. } => "",
            _ => self.usernames.first().copied().unwrap_or_default(),
        }
    }
}

/// 挂载点配置不完整时，在进入核心逻辑前直接返回 500。
pub async fn require_configuration(
    Extension(mount): Extension<Arc<Mount>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, ApiError> {
    if let AuthMode::Misconfigured { missing } = mount.auth.mode {
        error!(provider = mount.id(), missing, "provider is partially configured");
        return Err(ApiError::Internal(format!(
            "Missing required environment variable: {missing}"
        )));
    }
    Ok(next.run(req).await)
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    username: Option<String>,
    password: Option<String>,
}

/// 登录表单：校验后写入 30 天会话 Cookie 并跳转回挂载点。
pub async fn login(
    Extension(mount): Extension<Arc<Mount>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let (Some(username), Some(password)) = (form.username, form.password) else {
        return Err(ApiError::BadRequest("username and password are required".into()));
    };

    let Some(token) = mount.auth.verify(&username, &password) else {
        warn!(provider = mount.id(), username, "login failed");
        let origin = request_origin(&headers);
        return Ok(Html(pages::login_failed(&mount, &origin)).into_response());
    };

    info!(provider = mount.id(), username, "login succeeded");
    let cookie = Cookie::build((mount.auth.cookie_name, token))
        .path(mount.cookie_path())
        .http_only(false)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::days(SESSION_COOKIE_MAX_AGE_DAYS))
        .build();
    Ok((jar.add(cookie), Redirect::to(mount.path())).into_response())
}

/// 登出：删除会话 Cookie。
pub async fn logout(Extension(mount): Extension<Arc<Mount>>, jar: CookieJar) -> Response {
    let jar = jar.remove(
        Cookie::build(mount.auth.cookie_name)
            .path(mount.cookie_path())
            .build(),
    );
    (jar, Redirect::to(mount.path())).into_response()
}
