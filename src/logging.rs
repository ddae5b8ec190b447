//! Tracing subscriber setup.
//!
//! Logs go to stderr so that command output on stdout stays machine
//! readable (`mbase query --json`). `RUST_LOG` takes precedence over
//! `[logging] level` from the config file:
//!
//! ```bash
//! RUST_LOG=manualbase_core=debug mbase ingest main_engine ./segments
//! ```

use std::sync::Once;

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install the global subscriber. Only the first call has any effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_filter(filter);

        // A subscriber installed by an embedding application wins.
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

