//! 提供方静态描述表与运行时覆盖。

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Dmm,
    TorBox,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Dmm, ProviderKind::TorBox];

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Dmm => "dmm",
            ProviderKind::TorBox => "torbox",
        }
    }
}

/// 删除接口使用的 HTTP 方法与凭据字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteStyle {
    /// `POST` JSON，凭据字段名为 `token`。
    PostToken,
    /// `DELETE` JSON，凭据字段名为 `apiKey`。
    DeleteApiKey,
}

struct StaticDescriptor {
    kind: ProviderKind,
    name: &'static str,
    mount: &'static str,
    link_endpoints: &'static [&'static str],
    token_keys: &'static [&'static str],
    delete_endpoint: &'static str,
    delete_style: DeleteStyle,
    cookie_name: &'static str,
    token_env: &'static str,
    username_env: &'static str,
    password_env: &'static str,
    usernames: &'static [&'static str],
    manage_url: &'static str,
    token_help_url: &'static str,
}

static REGISTRY: [StaticDescriptor; 2] = [
    StaticDescriptor {
        kind: ProviderKind::Dmm,
        name: "DMM Cast",
        mount: "/",
        link_endpoints: &["/api/stremio/links"],
        token_keys: &["token"],
        delete_endpoint: "/api/stremio/deletelink",
        delete_style: DeleteStyle::PostToken,
        cookie_name: "dmm_session",
        token_env: "RD_ACCESS_TOKEN",
        username_env: "WEBDAV_USERNAME",
        password_env: "WEBDAV_PASSWORD",
        usernames: &["apitoken", "realdebrid"],
        manage_url: "https://debridmediamanager.com/stremio/manage",
        token_help_url: "https://real-debrid.com/apitoken",
    },
    StaticDescriptor {
        kind: ProviderKind::TorBox,
        name: "DMM Cast (TorBox)",
        mount: "/torbox/",
        link_endpoints: &["/api/stremio-tb/links", "/api/stremio/tb/links"],
        token_keys: &["apiKey", "token"],
        delete_endpoint: "/api/stremio-tb/deletelink",
        delete_style: DeleteStyle::DeleteApiKey,
        cookie_name: "torbox_session",
        token_env: "TORBOX_API_KEY",
        username_env: "TORBOX_WEBDAV_USERNAME",
        password_env: "TORBOX_WEBDAV_PASSWORD",
        usernames: &["apitoken", "apikey", "torbox"],
        manage_url: "https://debridmediamanager.com/stremio-torbox/manage",
        token_help_url: "https://torbox.app/settings",
    },
];

/// 单个提供方的运行时配置（来自环境变量）。
#[derive(Clone, Debug, Default)]
pub struct ProviderSettings {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub link_endpoints: Vec<String>,
    pub token_keys: Vec<String>,
    pub catalog_base: String,
    pub resolver_base: Option<String>,
}

/// 提供方描述：端点、认证 Cookie、挂载点等。
#[derive(Clone, Debug)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub name: &'static str,
    pub mount: &'static str,
    pub catalog_base: String,
    pub link_endpoints: Vec<String>,
    pub token_keys: Vec<String>,
    pub delete_endpoint: &'static str,
    pub delete_style: DeleteStyle,
    pub cookie_name: &'static str,
    pub token_env: &'static str,
    pub username_env: &'static str,
    pub password_env: &'static str,
    pub usernames: &'static [&'static str],
    pub manage_url: &'static str,
    pub token_help_url: &'static str,
    pub resolver_base: Option<String>,
}

impl ProviderDescriptor {
    /// 按声明顺序枚举 (端点, 令牌参数名) 组合。
    pub fn catalog_attempts(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.link_endpoints.iter().flat_map(move |endpoint| {
            let url = format!("{}{}", self.catalog_base, endpoint);
            self.token_keys
                .iter()
                .map(move |key| (url.clone(), key.as_str()))
        })
    }

    pub fn delete_url(&self) -> String {
        format!("{}{}", self.catalog_base, self.delete_endpoint)
    }
}

/// 由静态表与覆盖配置构建描述。
pub fn descriptor(kind: ProviderKind, settings: &ProviderSettings) -> ProviderDescriptor {
    let entry = REGISTRY
        .iter()
        .find(|entry| entry.kind == kind)
        .unwrap_or(&REGISTRY[0]);
    ProviderDescriptor {
        kind,
        name: entry.name,
        mount: entry.mount,
        catalog_base: settings.catalog_base.clone(),
        link_endpoints: or_defaults(&settings.link_endpoints, entry.link_endpoints),
        token_keys: or_defaults(&settings.token_keys, entry.token_keys),
        delete_endpoint: entry.delete_endpoint,
        delete_style: entry.delete_style,
        cookie_name: entry.cookie_name,
        token_env: entry.token_env,
        username_env: entry.username_env,
        password_env: entry.password_env,
        usernames: entry.usernames,
        manage_url: entry.manage_url,
        token_help_url: entry.token_help_url,
        resolver_base: settings.resolver_base.clone(),
    }
}

fn or_defaults(overrides: &[String], defaults: &[&str]) -> Vec<String> {
    if overrides.is_empty() {
        defaults.iter().map(|value| value.to_string()).collect()
    } else {
        overrides.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProviderSettings {
        ProviderSettings {
            catalog_base: "https://dmm.example".into(),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn mounts_are_distinct() {
        let dmm = descriptor(ProviderKind::Dmm, &settings());
        let torbox = descriptor(ProviderKind::TorBox, &settings());
        assert_eq!(dmm.mount, "/");
        assert_eq!(torbox.mount, "/torbox/");
        assert_ne!(dmm.cookie_name, torbox.cookie_name);
    }

    #[test]
    fn catalog_attempts_follow_declared_order() {
        let torbox = descriptor(ProviderKind::TorBox, &settings());
        let attempts: Vec<_> = torbox
            .catalog_attempts()
            .map(|(url, key)| format!("{url}?{key}"))
            .collect();
        assert_eq!(
            attempts,
            vec![
                "https://dmm.example/api/stremio-tb/links?apiKey",
                "https://dmm.example/api/stremio-tb/links?token",
                "https://dmm.example/api/stremio/tb/links?apiKey",
                "https://dmm.example/api/stremio/tb/links?token",
            ]
        );
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut overridden = settings();
        overridden.link_endpoints = vec!["/custom".into()];
        let dmm = descriptor(ProviderKind::Dmm, &overridden);
        assert_eq!(dmm.link_endpoints, vec!["/custom".to_string()]);
        assert_eq!(dmm.token_keys, vec!["token".to_string()]);
        assert_eq!(dmm.delete_url(), "https://dmm.example/api/stremio/deletelink");
    }
}
