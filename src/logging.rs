// Logging setup for corral.
//
// Built on the `tracing` ecosystem. The crate itself only emits events;
// hosts that want output call one of the init functions below (or install
// their own subscriber) once, early in main.

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for the logging subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: Level,
    /// Whether to use JSON format for logs.
    pub json_format: bool,
    /// Whether to include thread name/id.
    pub show_thread_info: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...").
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

// Initialization guard so only the first init takes effect.
static INIT: Once = Once::new();

/// Install the global tracing subscriber with the given configuration.
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
        if let Some(filters) = config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let fmt_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            Box::new(registry.with(fmt_layer))
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {err}");
        }
    });
}

/// Initialize with defaults: INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// Initialize for tests: warnings and errors only, no thread noise.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_thread_info: false,
        ..Default::default()
    });
}
