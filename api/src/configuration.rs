use crate::domain::SubscriberEmail;
use crate::opt_in::OptInConfig;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, FileFormat};
use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use telemetry::TelemetrySettings;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email_settings: EmailClientSettings,
    pub telemetry: TelemetrySettings,
    pub opt_in: OptInSettings,
    pub form: FormSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub application_port: u16,
    pub host_name: String,
    pub base_url: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub table_name: String,
    pub use_local: bool,
    pub local_endpoint: String,
    pub use_in_memory: bool,
    pub timeout_milliseconds: u64,
}

impl DatabaseSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub authorization_token: Secret<String>,
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Deserialize, Clone)]
pub struct OptInSettings {
    pub token_ttl_seconds: i64,
    pub default_source: String,
}

/// Where the command line form client posts signups, and where it keeps them
/// when the endpoint cannot be reached.
#[derive(Deserialize, Clone)]
pub struct FormSettings {
    pub endpoint: String,
    pub source: String,
    pub fallback_path: PathBuf,
    pub timeout_milliseconds: u64,
}

impl FormSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

/// Upper bound for `opt_in.token_ttl_seconds`: one year.
const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

impl Settings {
    pub fn opt_in_config(&self) -> Result<OptInConfig, ConfigError> {
        let token_ttl_seconds = self.opt_in.token_ttl_seconds;
        if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&token_ttl_seconds) {
            return Err(ConfigError::Message(format!(
                "opt_in.token_ttl_seconds must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_SECONDS, token_ttl_seconds
            )));
        }

        Ok(OptInConfig {
            base_url: self.application.base_url.clone(),
            token_ttl: chrono::Duration::seconds(token_ttl_seconds),
            default_source: self.opt_in.default_source.clone(),
            store_timeout: self.database.timeout(),
            delivery_timeout: self.email_settings.timeout(),
        })
    }
}

pub async fn get_configuration() -> Result<Settings, ConfigError> {
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let builder = with_defaults(config::Config::builder())?;

    let builder = match (&environment, std::env::var("CONFIG_PARAMETER_NAME")) {
        (Environment::Production, Ok(parameter_name)) => {
            let document = read_parameter(&parameter_name).await?;
            builder.add_source(config::File::from_str(&document, FileFormat::Yaml))
        }
        _ => {
            let configuration_directory = std::env::current_dir()
                .map_err(|e| ConfigError::Foreign(Box::new(e)))?
                .join("configuration");
            let environment_filename = format!("{}.yaml", environment.as_str());

            builder
                .add_source(
                    config::File::from(configuration_directory.join("base.yaml")).required(false),
                )
                .add_source(
                    config::File::from(configuration_directory.join(environment_filename))
                        .required(false),
                )
        }
    };

    let settings = builder
        // E.g. `APP_OPT_IN__TOKEN_TTL_SECONDS=60` sets `Settings.opt_in.token_ttl_seconds`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("database.table_name", std::env::var("SUBSCRIBERS_TABLE").ok())?
        .build()?;

    settings.try_deserialize::<Settings>()
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("application.application_port", 8000)?
        .set_default("application.host_name", "127.0.0.1")?
        .set_default("application.base_url", "http://127.0.0.1:8000")?
        .set_default("database.table_name", "FikraSubscribers")?
        .set_default("database.use_local", false)?
        .set_default("database.local_endpoint", "http://localhost:8000")?
        .set_default("database.use_in_memory", false)?
        .set_default("database.timeout_milliseconds", 2000)?
        .set_default("email_settings.base_url", "https://api.postmarkapp.com")?
        .set_default("email_settings.sender_email", "hello@example.com")?
        .set_default("email_settings.authorization_token", "")?
        .set_default("email_settings.timeout_milliseconds", 10000)?
        .set_default("telemetry.otlp_endpoint", "")?
        .set_default("telemetry.honeycomb_api_key", "")?
        .set_default("telemetry.dataset_name", "signup")?
        .set_default("opt_in.token_ttl_seconds", 86400)?
        .set_default("opt_in.default_source", "site")?
        .set_default("form.endpoint", "http://127.0.0.1:8000/subscriptions")?
        .set_default("form.source", "site")?
        .set_default("form.fallback_path", "signup-emails.json")?
        .set_default("form.timeout_milliseconds", 5000)
}

async fn read_parameter(parameter_name: &str) -> Result<String, ConfigError> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(make_region_provider())
        .load()
        .await;
    let ssm_client = aws_sdk_ssm::Client::new(&sdk_config);

    let output = ssm_client
        .get_parameter()
        .name(parameter_name)
        .with_decryption(true)
        .send()
        .await
        .map_err(|e| ConfigError::Foreign(Box::new(e)))?;

    output
        .parameter
        .and_then(|parameter| parameter.value)
        .ok_or_else(|| ConfigError::NotFound(parameter_name.to_string()))
}

pub fn make_region_provider() -> RegionProviderChain {
    RegionProviderChain::default_provider().or_else(Region::new("us-east-1"))
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either local or production",
                other
            )),
        }
    }
}
