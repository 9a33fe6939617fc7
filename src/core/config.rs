mod parsing;
mod types;

pub use types::{
    ConfigError, DispatchSettings, Environment, MlSettings, RuntimeSettings, Settings,
    TelemetrySettings,
};

use parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_u32, parse_u64, parse_usize,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(
            env_optional("SCANGRADE_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("SCANGRADE_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let queue_capacity =
            parse_usize("JOB_QUEUE_CAPACITY", env_or_default("JOB_QUEUE_CAPACITY", "1024"))?;
        let workers_per_queue =
            parse_usize("JOB_WORKERS_PER_QUEUE", env_or_default("JOB_WORKERS_PER_QUEUE", "3"))?;

        let ml_base_url = env_or_default("ML_SERVICE_URL", "http://localhost:8001");
        let ml_api_key = env_or_default("ML_SERVICE_API_KEY", "");
        let ml_model_id = env_or_default("ML_MODEL_ID", "default");
        let ml_request_timeout_seconds =
            parse_u64("ML_REQUEST_TIMEOUT", env_or_default("ML_REQUEST_TIMEOUT", "120"))?;
        let ml_max_retries = parse_u32("ML_MAX_RETRIES", env_or_default("ML_MAX_RETRIES", "3"))?;

        let log_level = env_or_default("SCANGRADE_LOG_LEVEL", "info");
        let json = env_optional("SCANGRADE_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            dispatch: DispatchSettings { queue_capacity, workers_per_queue },
            ml: MlSettings {
                base_url: ml_base_url,
                api_key: ml_api_key,
                model_id: ml_model_id,
                request_timeout_seconds: ml_request_timeout_seconds,
                max_retries: ml_max_retries,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn dispatch(&self) -> &DispatchSettings {
        &self.dispatch
    }

    pub fn ml(&self) -> &MlSettings {
        &self.ml
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "JOB_QUEUE_CAPACITY",
                value: "0".to_string(),
            });
        }
        if self.dispatch.workers_per_queue == 0 {
            return Err(ConfigError::InvalidValue {
                field: "JOB_WORKERS_PER_QUEUE",
                value: "0".to_string(),
            });
        }
        if self.ml.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ML_SERVICE_URL",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.ml.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("ML_SERVICE_API_KEY"));
        }

        Ok(())
    }
}
