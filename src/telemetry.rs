//! Opt-in file logging for harness runs.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the log file.
pub const LOG_PATH_ENV: &str = "STATEHOST_LOG";

/// Filter used when `RUST_LOG` is unset: container lifecycle and intent
/// outcomes, without per-item traces.
const DEFAULT_FILTER: &str = "statehost=debug";

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install a file subscriber for this process if `STATEHOST_LOG` is set.
///
/// [`crate::testing::test_with`] calls this before attaching, so setting the
/// variable is enough to get logs from a failing harness test. The file is
/// `{STATEHOST_LOG}.{pid}`, one per test binary.
///
/// Only the first call does any work. Later calls return its result.
pub fn init_tracing() -> bool {
    *INSTALLED.get_or_init(install)
}

fn install() -> bool {
    let Ok(log_path) = std::env::var(LOG_PATH_ENV) else {
        return false;
    };

    let path = format!("{}.{}", log_path, std::process::id());
    let file = match std::fs::File::create(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("statehost: cannot create log file {path}: {err}");
            return false;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true);

    // A test binary may have installed its own subscriber already.
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(path = %path, "File logging enabled");
    }
    installed
}
