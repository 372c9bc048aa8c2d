use super::parsing::{
    env_optional, env_or_default, generate_secret_key, parse_bool, parse_cors_origins,
    parse_environment, parse_positive_f64, parse_u16, parse_u32, parse_u64,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, QuizSettings,
    RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings,
};

const DEFAULT_AI_MODEL: &str = "models/gemini-2.5-pro";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("REFUERZO_HOST", "0.0.0.0");
        let port = env_or_default("REFUERZO_PORT", "8000");

        let environment = parse_environment(
            env_optional("REFUERZO_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("REFUERZO_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Refuerzo API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let (secret_key, secret_key_generated) = match env_optional("SECRET_KEY") {
            Some(value) => (value, false),
            None => (generate_secret_key(), true),
        };
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "refuerzo");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "refuerzo_db");
        let database_url = env_optional("DATABASE_URL");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env_or_default("DATABASE_MAX_CONNECTIONS", "10"),
        )?;

        let gemini_api_key = env_or_default("GEMINI_API_KEY", "");
        let gemini_base_url = env_or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL);
        let model = env_or_default("AI_MODEL", DEFAULT_AI_MODEL);
        let request_timeout_seconds =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "600"))?;
        let max_attempts = parse_u32("AI_MAX_ATTEMPTS", env_or_default("AI_MAX_ATTEMPTS", "3"))?;
        let retry_delay_ms =
            parse_u64("AI_RETRY_DELAY_MS", env_or_default("AI_RETRY_DELAY_MS", "1000"))?;

        let min_questions =
            parse_u32("QUIZ_MIN_QUESTIONS", env_or_default("QUIZ_MIN_QUESTIONS", "3"))?;
        let max_questions =
            parse_u32("QUIZ_MAX_QUESTIONS", env_or_default("QUIZ_MAX_QUESTIONS", "12"))?;
        let grade_scale =
            parse_positive_f64("QUIZ_GRADE_SCALE", env_or_default("QUIZ_GRADE_SCALE", "19"))?;

        let log_level = env_or_default("REFUERZO_LOG_LEVEL", "info");
        let json =
            env_optional("REFUERZO_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                secret_key_generated,
                algorithm,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            ai: AiSettings {
                gemini_api_key,
                gemini_base_url: gemini_base_url.trim_end_matches('/').to_string(),
                model,
                request_timeout_seconds,
                max_attempts,
                retry_delay_ms,
            },
            quiz: QuizSettings { min_questions, max_questions, grade_scale },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.quiz.min_questions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_MIN_QUESTIONS",
                value: "0".to_string(),
            });
        }

        if self.quiz.max_questions < self.quiz.min_questions {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_MAX_QUESTIONS",
                value: self.quiz.max_questions.to_string(),
            });
        }

        if self.ai.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.security.secret_key_generated {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }
        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.gemini_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("GEMINI_API_KEY"));
        }

        Ok(())
    }
}
