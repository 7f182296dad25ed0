use chrono::Duration;
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const DEFAULT_TOKEN_SECRET: &str = "opensplit-dev-secret";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub path: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: "data.json".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub token_secret: String,
    pub token_ttl_days: i64,
}

impl Auth {
    pub fn uses_default_secret(&self) -> bool {
        self.token_secret == DEFAULT_TOKEN_SECRET
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            token_secret: DEFAULT_TOKEN_SECRET.into(),
            token_ttl_days: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Codes {
    pub ttl_minutes: i64,
}

impl Default for Codes {
    fn default() -> Self {
        Self { ttl_minutes: 10 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub default_country_code: String,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            default_country_code: "1".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Links {
    /// Payment links never expire when unset.
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Notifier {
    /// Channels without a webhook run in development mode.
    pub sms_webhook: Option<String>,
    pub email_webhook: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: Server,
    pub store: Storage,
    pub auth: Auth,
    pub codes: Codes,
    pub contact: Contact,
    pub links: Links,
    pub notifier: Notifier,
}

impl Settings {
    /// Defaults, then `config.toml` if present, then `APP__SECTION__KEY`
    /// environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder()
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn builder() -> ConfigBuilder<DefaultState> {
        Config::builder()
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::days(self.auth.token_ttl_days)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::minutes(self.codes.ttl_minutes)
    }

    pub fn link_ttl(&self) -> Option<Duration> {
        self.links.ttl_hours.map(Duration::hours)
    }
}
