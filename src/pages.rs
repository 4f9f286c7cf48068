//! 浏览页与登录页的 HTML 视图。

use crate::provider::catalog::LinkRecord;
use crate::provider::registry::ProviderKind;
use crate::routes::Mount;
use crate::vfs::encode_href_name;

const STYLESHEET: &str = "https://cdn.jsdelivr.net/npm/@picocss/pico@2/css/pico.min.css";

/// 转义 HTML 文本与属性值。
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn token_label(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Dmm => "Real-Debrid API Token",
        ProviderKind::TorBox => "TorBox API Key",
    }
}

fn layout(mount: &Mount, content: &str) -> String {
    let title = escape_html(mount.descriptor().name);
    format!(
        r#"<!DOCTYPE html>
<html data-theme="light">
<head>
    <meta charset="UTF-8">
    <title>{title} WebDAV</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{STYLESHEET}">
    <link rel="stylesheet" href="/style.css">
</head>
<body>
    <main class="container">
        <article>
{content}
        </article>
    </main>
</body>
</html>"#
    )
}

/// 连接提示：WebDAV 地址与用户名密码说明。
fn webdav_hints(mount: &Mount, origin: &str) -> String {
    let (username, password) = if mount.auth.mode.is_single_user() {
        ("your configured username", "your configured password")
    } else {
        (mount.auth.default_username(), "[your API token]")
    };
    format!(
        r#"<ul class="webdav-hints">
    <li><strong>WebDAV URL:</strong> <code>{url}</code></li>
    <li><strong>username:</strong> <code>{username}</code></li>
    <li><strong>password:</strong> <code>{password}</code></li>
</ul>"#,
        url = escape_html(&format!("{origin}{}", mount.path())),
        username = escape_html(username),
    )
}

fn link_item(mount: &Mount, record: &LinkRecord) -> String {
    format!(
        r#"<li>
    {filename}
    <small class="nowrap">
        <a href="{url}" target="_blank"><code>{size} GB</code></a>
        &nbsp;<a href="{strm}"><code>1 KB .strm</code></a>
    </small>
</li>"#,
        filename = escape_html(&record.filename),
        url = escape_html(record.display_url()),
        size = escape_html(&record.size_gb),
        strm = escape_html(&format!(
            "{}{}",
            mount.path(),
            encode_href_name(&record.strm_filename)
        )),
    )
}

/// 已登录时的目录浏览页。
pub fn browse(mount: &Mount, records: &[LinkRecord], origin: &str) -> String {
    let descriptor = mount.descriptor();
    let manage_url = escape_html(descriptor.manage_url);
    let items: String = records.iter().map(|record| link_item(mount, record)).collect();
    let listing = if records.is_empty() {
        "<p>No casted links yet.</p>".to_string()
    } else {
        format!("<ul>\n{items}\n</ul>")
    };
    let content = format!(
        r#"<header>
    <h2>{name}</h2>
    <p>Stream media from Debrid Media Manager Cast</p>
</header>
<div class="status-info">
    <p><small>source: <a href="{manage_url}" target="_blank">{manage_url}</a></small></p>
    {hints}
    <a href="{logout}" role="button" class="outline secondary">Sign Out</a>
    {listing}
</div>
<div class="button-wrapper">
    <a href="{manage_url}" target="_blank" role="button">Manage Casted Links</a>
</div>"#,
        name = escape_html(descriptor.name),
        hints = webdav_hints(mount, origin),
        logout = escape_html(&format!("{}logout", mount.path())),
    );
    layout(mount, &content)
}

fn login_form(mount: &Mount, origin: &str, notice: Option<&str>) -> String {
    let descriptor = mount.descriptor();
    let single_user = mount.auth.mode.is_single_user();
    let (intro, password_label, placeholder, readonly) = if single_user {
        (
            "Sign in with your WebDAV credentials.".to_string(),
            "WebDAV Password",
            "enter WebDAV password",
            "",
        )
    } else {
        (
            format!(
                "Enter your {} to browse your files.",
                token_label(descriptor.kind)
            ),
            token_label(descriptor.kind),
            "paste your API token",
            "readonly",
        )
    };
    let token_help = if single_user {
        String::new()
    } else {
        format!(
            r#"<small><a href="{url}" target="_blank">{url}</a></small>"#,
            url = escape_html(descriptor.token_help_url)
        )
    };
    let notice = notice
        .map(|message| {
            format!(
                r#"<span class="status-badge error">ERROR</span><p>{}</p>"#,
                escape_html(message)
            )
        })
        .unwrap_or_default();
    let content = format!(
        r#"<header>
    {notice}
    <h2>{name}</h2>
    <p>{intro}</p>
</header>
<form method="POST" action="{action}">
    <label for="username">Username
        <input type="text" id="username" name="username" value="{username}" {readonly} autocomplete="username" required>
    </label>
    <label for="password">{password_label}
        <input type="password" id="password" name="password" placeholder="{placeholder}" autocomplete="current-password" required>
        {token_help}
    </label>
    <button type="submit">Sign In</button>
</form>
<article>
    <h3>WebDAV for Infuse and other media players</h3>
    {hints}
</article>"#,
        name = escape_html(descriptor.name),
        intro = escape_html(&intro),
        action = escape_html(&format!("{}login", mount.path())),
        username = escape_html(mount.auth.default_username()),
        hints = webdav_hints(mount, origin),
    );
    layout(mount, &content)
}

/// 未登录时的登录页。
pub fn login_page(mount: &Mount, origin: &str) -> String {
    login_form(mount, origin, None)
}

/// 登录失败页。
pub fn login_failed(mount: &Mount, origin: &str) -> String {
    login_form(mount, origin, Some("Invalid username or password."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMode;
    use crate::test_support::{dmm_mount, torbox_mount};
    use crate::vfs::pointer_filename;
    use chrono::Utc;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn browse_links_pointer_files_with_literal_braces() {
        let mount = torbox_mount(AuthMode::MultiUser, "http://127.0.0.1:9".into());
        let record = LinkRecord {
            url: None,
            filename: "Movie <2024>.mkv".into(),
            strm_filename: pointer_filename("Movie <2024>.mkv", "abc", "tt1"),
            size_gb: "1.5".into(),
            updated_at: Utc::now(),
            hash: "abc".into(),
            imdb_id: "tt1".into(),
        };
        let html = browse(&mount, &[record], "https://cast.example.com");
        assert!(html.contains("Movie &lt;2024&gt;.mkv"));
        assert!(html.contains(r#"href="/torbox/Movie%20%3C2024%3E.mkv{hash-abc}{imdb-tt1}.strm""#));
        assert!(html.contains(r##"href="#""##));
        assert!(html.contains("https://cast.example.com/torbox/"));
        assert!(html.contains(r#"href="/torbox/logout""#));
    }

    #[test]
    fn login_form_prefills_alias_in_multi_user_mode() {
        let mount = dmm_mount(AuthMode::MultiUser, "http://127.0.0.1:9".into());
        let html = login_page(&mount, "http://localhost");
        assert!(html.contains(r#"value="apitoken" readonly"#));
        assert!(html.contains("Real-Debrid API Token"));
        assert!(html.contains(r#"action="/login""#));

        let failed = login_failed(&mount, "http://localhost");
        assert!(failed.contains("Invalid username or password."));
    }

    #[test]
    fn login_form_leaves_username_blank_in_single_user_mode() {
        let mount = dmm_mount(
            AuthMode::SingleUser {
                token: "t".into(),
                username: "admin".into(),
                password: "p".into(),
            },
            "http://127.0.0.1:9".into(),
        );
        let html = login_page(&mount, "http://localhost");
        assert!(html.contains(r#"value="" "#));
        assert!(html.contains("WebDAV Password"));
        assert!(!html.contains("admin"));
    }
}
