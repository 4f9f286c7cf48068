//! 日志初始化：`-v` 决定默认级别，设置了 `RUST_LOG` 时以其为准。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 连接与 TLS 细节只在出问题时输出。
const QUIET_DEPENDENCIES: [&str; 4] = ["hyper", "hyper_util", "reqwest", "rustls"];

/// 根据 `-v` 次数生成默认过滤规则。
pub fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    std::iter::once(level.to_string())
        .chain(
            QUIET_DEPENDENCIES
                .iter()
                .map(|target| format!("{target}=warn")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// 初始化 tracing 日志订阅；详细模式下附带事件来源模块。
pub fn init_logging(verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose > 0),
        )
        .init();
}
