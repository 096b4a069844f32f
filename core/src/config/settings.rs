use super::BrokerConfig;
use crate::Result;
use config::{Config, Environment};

impl BrokerConfig {
    /// Build a config from `SSPQ_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = BrokerConfig::default();
        let settings = Config::builder()
            .set_default("host", defaults.host)
            .and_then(|b| b.set_default("port", i64::from(defaults.port)))
            .and_then(|b| b.set_default("log_level", defaults.log_level.to_string()))
            .and_then(|b| b.set_default("dead_letter_queue", defaults.dead_letter_queue))
            .and_then(|b| b.set_default("max_frame_size", defaults.max_frame_size as i64))
            .map_err(|e| crate::SspqError::Config(e.to_string()))?
            .add_source(Environment::with_prefix("SSPQ").try_parsing(true))
            .build()
            .map_err(|e| crate::SspqError::Config(e.to_string()))?;

        let config = settings
            .try_deserialize::<BrokerConfig>()
            .map_err(|e| crate::SspqError::Config(e.to_string()))?;

        config.validate().map_err(crate::SspqError::Config)?;
        Ok(config)
    }
}
