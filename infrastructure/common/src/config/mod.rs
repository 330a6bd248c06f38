use getset::Getters;
use serde::*;

use crate::telemetry::TelemetryConfig;

/// Environment variables override file settings when they carry this prefix,
/// e.g. `BILLING__BATCH__CHUNK_SIZE=1000`.
pub const ENV_PREFIX: &str = "BILLING";

#[derive(Default, Deserialize, Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct CommonConfig {
    #[serde(default)]
    telemetry: TelemetryConfig,
    #[serde(default)]
    store: StoreConfig,
}

/// Where the file backed stores keep their documents.
#[derive(Deserialize, Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_path")]
    path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl StoreConfig {
    fn default_path() -> String {
        "./data".to_string()
    }
}

pub fn build_config() -> anyhow::Result<config::Config> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = config::Config::builder().add_source(
        config::File::with_name("config")
            .required(false)
            .format(config::FileFormat::Yaml),
    );
    for arg in args {
        if arg.ends_with("yaml") || arg.ends_with("yml") {
            config = config.add_source(
                config::File::from(std::path::Path::new(arg.as_str()))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }
    }
    config = config.add_source(environment());
    Ok(config.build()?)
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(";")
        .with_list_parse_key("cluster_filter.excluded_cluster_ids")
        .with_list_parse_key("feature_flags.cluster_scoped_billing_accounts")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default, flatten)]
        common: CommonConfig,
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = config::Config::builder()
            .add_source(config::File::from_str("{}", config::FileFormat::Yaml))
            .build()
            .unwrap();

        let wrapper: Wrapper = config.try_deserialize().unwrap();

        assert_eq!(wrapper.common.store().path(), "./data");
        assert!(wrapper.common.telemetry().enable);
    }

    #[test]
    fn yaml_sections_are_read() {
        let yaml = indoc! {"
            store:
              path: /var/lib/billing
            telemetry:
              max_level: Info
              file:
                enable: true
                rolling_time: Daily
        "};
        let config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap();

        let wrapper: Wrapper = config.try_deserialize().unwrap();

        assert_eq!(wrapper.common.store().path(), "/var/lib/billing");
        assert!(wrapper.common.telemetry().file.enable);
        assert_eq!(wrapper.common.telemetry().file.prefix, "billing.log");
    }
}
