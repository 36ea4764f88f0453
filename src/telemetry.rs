use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_subscriber::fmt::time::UtcTime;

use crate::config::ReaderConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub(crate) fn trace_log_path(config: &ReaderConfig) -> Option<PathBuf> {
    if let Some(path) = &config.trace_log {
        return Some(path.clone());
    }
    env::var("SHADOWREAD_TRACE_LOG").map(PathBuf::from).ok()
}

/// Install a JSON-lines trace subscriber the first time a session is built.
/// Does nothing when no log destination is configured, and never clobbers a
/// subscriber the host already installed.
pub(crate) fn init_tracing(config: &ReaderConfig) {
    let Some(path) = trace_log_path(config) else {
        return;
    };

    let _ = TRACING_INIT.get_or_init(|| {
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
