//! 命令行参数、环境变量与默认配置。

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;
use crate::provider::registry::{ProviderKind, ProviderSettings};

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_DMM_BASE_URL: &str = "https://debridmediamanager.com";
pub const DEFAULT_TORBOX_API_URL: &str = "https://api.torbox.app/v1/api";
pub const RESOLUTION_CACHE_TTL_SECS: u64 = 5 * 60;
pub const SESSION_COOKIE_MAX_AGE_DAYS: i64 = 30;
pub const UPSTREAM_USER_AGENT: &str = concat!("dmm-cast-webdav/", env!("CARGO_PKG_VERSION"));

/// 服务端命令行参数与环境变量配置。
#[derive(Parser, Debug, Default)]
#[command(
    name = "dmm-cast-webdav",
    version = VERSION_INFO,
    about = "WebDAV gateway for debrid cast links"
)]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "HOST",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8787, help = "HTTP port")]
    pub port: u16,
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace)"
    )]
    pub verbose: u8,
    #[arg(long, env = "CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "DMM_BASE_URL",
        default_value = DEFAULT_DMM_BASE_URL,
        help = "Debrid Media Manager base URL"
    )]
    pub dmm_base_url: String,
    #[arg(
        long,
        env = "TORBOX_API_URL",
        default_value = DEFAULT_TORBOX_API_URL,
        help = "TorBox API base URL"
    )]
    pub torbox_api_url: String,

    #[arg(long, env = "RD_ACCESS_TOKEN", hide_env_values = true, help = "Real-Debrid token (single-user mode)")]
    pub rd_access_token: Option<String>,
    #[arg(long, env = "WEBDAV_USERNAME", help = "WebDAV username (single-user mode)")]
    pub webdav_username: Option<String>,
    #[arg(long, env = "WEBDAV_PASSWORD", hide_env_values = true, help = "WebDAV password (single-user mode)")]
    pub webdav_password: Option<String>,
    #[arg(long, env = "DMM_LINK_ENDPOINTS", help = "Comma separated DMM cast list endpoints")]
    pub dmm_link_endpoints: Option<String>,
    #[arg(long, env = "DMM_TOKEN_KEYS", help = "Comma separated token query keys for DMM")]
    pub dmm_token_keys: Option<String>,

    #[arg(long, env = "TORBOX_API_KEY", hide_env_values = true, help = "TorBox API key (single-user mode)")]
    pub torbox_api_key: Option<String>,
    #[arg(long, env = "TORBOX_WEBDAV_USERNAME", help = "TorBox WebDAV username (single-user mode)")]
    pub torbox_webdav_username: Option<String>,
    #[arg(long, env = "TORBOX_WEBDAV_PASSWORD", hide_env_values = true, help = "TorBox WebDAV password (single-user mode)")]
    pub torbox_webdav_password: Option<String>,
    #[arg(long, env = "TORBOX_LINK_ENDPOINTS", help = "Comma separated TorBox cast list endpoints")]
    pub torbox_link_endpoints: Option<String>,
    #[arg(long, env = "TORBOX_TOKEN_KEYS", help = "Comma separated token query keys for TorBox")]
    pub torbox_token_keys: Option<String>,
}

impl Args {
    /// 提取指定提供方的凭据与端点覆盖配置。
    pub fn provider_settings(&self, kind: ProviderKind) -> ProviderSettings {
        match kind {
            ProviderKind::Dmm => ProviderSettings {
                token: non_blank(&self.rd_access_token),
                username: non_blank(&self.webdav_username),
                password: non_blank(&self.webdav_password),
                link_endpoints: split_list(self.dmm_link_endpoints.as_deref()),
                token_keys: split_list(self.dmm_token_keys.as_deref()),
                catalog_base: self.dmm_base_url.trim_end_matches('/').to_string(),
                resolver_base: None,
            },
            ProviderKind::TorBox => ProviderSettings {
                token: non_blank(&self.torbox_api_key),
                username: non_blank(&self.torbox_webdav_username),
                password: non_blank(&self.torbox_webdav_password),
                link_endpoints: split_list(self.torbox_link_endpoints.as_deref()),
                token_keys: split_list(self.torbox_token_keys.as_deref()),
                catalog_base: self.dmm_base_url.trim_end_matches('/').to_string(),
                resolver_base: Some(self.torbox_api_url.trim_end_matches('/').to_string()),
            },
        }
    }
}

/// 全空白视为未设置，否则原样保留。
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// 解析逗号分隔列表，忽略空项。
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blank_items() {
        assert_eq!(
            split_list(Some(" /a, ,/b ,")),
            vec!["/a".to_string(), "/b".to_string()]
        );
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn credentials_keep_surrounding_whitespace() {
        let args = Args {
            rd_access_token: Some("rd-token".into()),
            webdav_username: Some("admin".into()),
            webdav_password: Some(" padded ".into()),
            ..Args::default()
        };
        let dmm = args.provider_settings(ProviderKind::Dmm);
        assert_eq!(dmm.password.as_deref(), Some(" padded "));
    }

    #[test]
    fn provider_settings_ignore_blank_credentials() {
        let args = Args {
            rd_access_token: Some("  ".into()),
            webdav_username: Some("admin".into()),
            dmm_base_url: "https://dmm.example/".into(),
            torbox_api_url: "https://tb.example/v1/api/".into(),
            ..Args::default()
        };
        let dmm = args.provider_settings(ProviderKind::Dmm);
        assert_eq!(dmm.token, None);
        assert_eq!(dmm.username.as_deref(), Some("admin"));
        assert_eq!(dmm.catalog_base, "https://dmm.example");

        let torbox = args.provider_settings(ProviderKind::TorBox);
        assert_eq!(torbox.resolver_base.as_deref(), Some("https://tb.example/v1/api"));
    }
}
