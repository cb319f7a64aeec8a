use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGET: &str = "protocol_router";

/// 日誌輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 給人看的單行格式
    Compact,
    /// 給下游工具讀取用的 JSON 行
    Json,
}

impl LogFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// 沒有 RUST_LOG 時使用的過濾字串。
/// `--verbose` 優先於設定檔的 level，兩者都沒有時是 info。
pub fn filter_directive(level: Option<&str>, verbose: bool) -> String {
    match (verbose, level) {
        (true, _) => format!("{}=debug,info", CRATE_TARGET),
        (false, Some(level)) => format!("{}={}", CRATE_TARGET, level.trim().to_lowercase()),
        (false, None) => format!("{}=info", CRATE_TARGET),
    }
}

/// RUST_LOG 有設定時蓋過 `directive`
pub fn init_logger(format: LogFormat, directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init(),
    }
}

pub fn init_cli_logger(verbose: bool) {
    init_logger(LogFormat::Compact, &filter_directive(None, verbose));
}
