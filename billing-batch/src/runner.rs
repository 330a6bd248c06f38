use chrono::Utc;
use colored::Colorize;
use infrastructure_common::{config::build_config, telemetry::initialize_telemetry};
use tracing::info;

use crate::infrastructure::ServiceProvider;

pub fn run() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(x) => x,
        Err(e) => {
            eprintln!("{}: {}", "Cannot build runtime".red(), e);
            std::process::exit(1);
        }
    };
    if !runtime.block_on(async_run()) {
        std::process::exit(1);
    }
}

/// Runs the configured invocation once. Returns whether it succeeded.
pub async fn async_run() -> bool {
    let config = match build_config() {
        Ok(x) => x,
        Err(e) => {
            eprintln!("{}: {}", "Cannot build config".red(), e);
            return false;
        }
    };

    let service_provider = match ServiceProvider::build(config).await {
        Ok(x) => x,
        Err(e) => {
            eprintln!("{}: {}", "Cannot build Service Provider".red(), e);
            return false;
        }
    };
    if let Err(e) = initialize_telemetry(service_provider.config.common.telemetry()) {
        eprintln!("{}: {}", "Cannot build logger".red(), e);
        return false;
    }

    let job = &service_provider.config.job;
    if job.account_id.is_empty() {
        eprintln!("{}", "No account configured (job.account_id)".red());
        return false;
    }
    let window = match job.window(Utc::now()) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("{}: {}", "Cannot resolve billing window".red(), e);
            return false;
        }
    };

    match service_provider
        .tasklet
        .run(&job.account_id, window, job.job_type)
        .await
    {
        Ok(summary) => {
            info!(
                "{} billing for {} over {window} done: {summary:?}",
                job.job_type, job.account_id
            );
            true
        }
        Err(e) => {
            eprintln!("{}: {:?}", "Billing failed".red(), anyhow::Error::from(e));
            false
        }
    }
}
