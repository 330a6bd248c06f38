pub mod config;
pub use self::config::*;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{Layer, Registry};

/// Installs the global subscriber. Fails if one is already set.
pub fn initialize_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    if !config.enable {
        return Ok(());
    }
    let filter = env_filter(
        config.max_level,
        &config.level_filter,
        &config.level_filter_env,
    );
    let console = {
        let config = &config.console;
        if config.enable {
            let enable_debug_logging = config.enable_debug_logging;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_file(enable_debug_logging)
                    .with_line_number(enable_debug_logging)
                    .with_thread_ids(enable_debug_logging)
                    .with_target(enable_debug_logging)
                    .with_filter(env_filter(
                        config.max_level,
                        &config.level_filter,
                        &config.level_filter_env,
                    )),
            )
        } else {
            None
        }
    };
    let file = {
        let config = &config.file;
        if config.enable {
            let enable_debug_logging = config.enable_debug_logging;
            let file_appender = RollingFileAppender::new(
                config.rolling_time.into(),
                &config.path,
                &config.prefix,
            );
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_appender)
                    .with_file(enable_debug_logging)
                    .with_line_number(enable_debug_logging)
                    .with_thread_ids(enable_debug_logging)
                    .with_target(enable_debug_logging)
                    .with_filter(env_filter(
                        config.max_level,
                        &config.level_filter,
                        &config.level_filter_env,
                    )),
            )
        } else {
            None
        }
    };
    Registry::default()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

fn env_filter(max_level: LoggingLevel, directives: &str, env: &str) -> EnvFilter {
    let mut filter_builder = EnvFilter::builder();
    if !env.is_empty() {
        filter_builder = filter_builder.with_env_var(env);
    }
    filter_builder
        .with_default_directive(max_level.into())
        .parse_lossy(directives)
}
