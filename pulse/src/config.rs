use serde::Deserialize;
use std::fs::File;
use timeline_api::config::Config as TimelineApiConfig;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "pulse".into()
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
    pub environment: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub timeline_api: Option<TimelineApiConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        if let Some(timeline_api) = &config.timeline_api {
            timeline_api.validate()?;
        }

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] timeline_api::config::ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use timeline_api::config::Environment;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    const TIMELINE_API_YAML: &str = r##"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            timeline_api:
                listener:
                    host: 0.0.0.0
                    port: 8080
                admin_listener:
                    host: 127.0.0.1
                    port: 8081
                environment: development
                repositories:
                    - owner: octo
                      name: website
                      color: "#4f46e5"
            "##;

    #[test]
    fn timeline_api_config() {
        let tmp = write_tmp_file(TIMELINE_API_YAML);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "pulse");
        assert!(config.common.logging.is_none());

        let timeline_api = config.timeline_api.expect("timeline api config");
        assert_eq!(timeline_api.listener.port, 8080);
        assert_eq!(timeline_api.environment, Environment::Development);
        assert_eq!(timeline_api.repositories[0].key(), "octo/website");
    }

    #[test]
    fn invalid_timeline_api_config() {
        let tmp = write_tmp_file(&TIMELINE_API_YAML.replace("port: 8081", "port: 0"));
        let result = Config::from_file(tmp.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_file() {
        let result = Config::from_file(std::path::Path::new("/nonexistent/pulse.yaml"));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
