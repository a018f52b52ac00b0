use std::{env, fmt, time::Duration};

use anyhow::Context;
use tracing::error;

pub const KAITEN_API_URL: &str = "KAITEN_API_URL";
pub const KAITEN_API_TOKEN: &str = "KAITEN_API_TOKEN";
pub const KAITEN_BOARD_ID: &str = "KAITEN_BOARD_ID";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_KAITEN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub fn get_host_uri() -> String {
    match env::var("HOST") {
        Ok(host) => format!("https://{host}"),
        _ => format!("http://localhost:{}", get_port()),
    }
}

pub fn get_port() -> u16 {
    let port = match env::var("PORT") {
        Ok(port) => port,
        _ => DEFAULT_PORT.to_string(),
    };
    let port: u16 = match port.parse::<_>() {
        Ok(port) => port,
        _ => {
            error!("Failed to parse PORT env var, using default");
            DEFAULT_PORT
        }
    };

    port
}

/// Timeout applied to every call made to the Kaiten API.
pub fn get_kaiten_timeout() -> Duration {
    get_duration("KAITEN_TIMEOUT", DEFAULT_KAITEN_TIMEOUT)
}

/// Upper bound for handling one inbound request end to end.
pub fn get_request_timeout() -> Duration {
    get_duration("REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT)
}

fn get_duration(var: &str, default: Duration) -> Duration {
    match env::var(var) {
        Ok(value) => match humantime::parse_duration(&value) {
            Ok(duration) => duration,
            Err(e) => {
                error!("Failed to parse {} env var ({}), using default", var, e);
                default
            }
        },
        _ => default,
    }
}

pub fn get_kaiten_config() -> KaitenConfig {
    KaitenConfig::from_lookup(|key| env::var(key).ok())
}

/// Connection details for the Kaiten board cards are created on.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KaitenConfig {
    pub api_url: String,
    pub api_token: String,
    pub board_id: String,
}

impl KaitenConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        Self {
            api_url: read(KAITEN_API_URL).trim_end_matches('/').to_string(),
            api_token: read(KAITEN_API_TOKEN),
            board_id: read(KAITEN_BOARD_ID),
        }
    }

    /// Names of the required variables that are absent or empty.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (KAITEN_API_URL, &self.api_url),
            (KAITEN_API_TOKEN, &self.api_token),
            (KAITEN_BOARD_ID, &self.board_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl fmt::Debug for KaitenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaitenConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("board_id", &self.board_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub kaiten: KaitenConfig,
    pub kaiten_timeout: Duration,
    pub request_timeout: Duration,
}

impl Settings {
    /// Reads everything the service needs from the environment, failing when
    /// the Kaiten connection details are incomplete or unusable.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = Self {
            port: get_port(),
            kaiten: get_kaiten_config(),
            kaiten_timeout: get_kaiten_timeout(),
            request_timeout: get_request_timeout(),
        };
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let missing = self.kaiten.missing();
        if !missing.is_empty() {
            return Err(anyhow::anyhow!(
                "Missing required configuration: {}",
                missing.join(", ")
            ));
        }

        let api_url = url::Url::parse(&self.kaiten.api_url)
            .with_context(|| format!("{KAITEN_API_URL} is not a valid URL"))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(anyhow::anyhow!(
                "{} must use http or https, got {}",
                KAITEN_API_URL,
                api_url.scheme()
            ));
        }

        // the Kaiten call has to give up first so its failure reaches the caller
        if self.request_timeout <= self.kaiten_timeout {
            return Err(anyhow::anyhow!(
                "REQUEST_TIMEOUT ({}) must be longer than KAITEN_TIMEOUT ({})",
                humantime::format_duration(self.request_timeout),
                humantime::format_duration(self.kaiten_timeout)
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn settings(kaiten: KaitenConfig) -> Settings {
        Settings {
            port: DEFAULT_PORT,
            kaiten,
            kaiten_timeout: DEFAULT_KAITEN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[test]
    fn reads_complete_config() {
        let config = KaitenConfig::from_lookup(lookup(&[
            (KAITEN_API_URL, "https://example.kaiten.ru/"),
            (KAITEN_API_TOKEN, "secret"),
            (KAITEN_BOARD_ID, "42"),
        ]));

        assert_eq!(config.api_url, "https://example.kaiten.ru");
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.board_id, "42");
        assert!(config.missing().is_empty());
        assert!(settings(config).validate().is_ok());
    }

    #[test]
    fn reports_absent_and_blank_values_as_missing() {
        let config = KaitenConfig::from_lookup(lookup(&[
            (KAITEN_API_URL, "https://example.kaiten.ru"),
            (KAITEN_API_TOKEN, "   "),
        ]));

        assert_eq!(config.missing(), vec![KAITEN_API_TOKEN, KAITEN_BOARD_ID]);

        let err = settings(config).validate().unwrap_err().to_string();
        assert!(err.contains(KAITEN_API_TOKEN));
        assert!(err.contains(KAITEN_BOARD_ID));
        assert!(!err.contains(KAITEN_API_URL));
    }

    #[test]
    fn rejects_unusable_api_url() {
        let config = KaitenConfig::from_lookup(lookup(&[
            (KAITEN_API_URL, "not a url"),
            (KAITEN_API_TOKEN, "secret"),
            (KAITEN_BOARD_ID, "42"),
        ]));
        assert!(settings(config).validate().is_err());

        let config = KaitenConfig::from_lookup(lookup(&[
            (KAITEN_API_URL, "ftp://example.kaiten.ru"),
            (KAITEN_API_TOKEN, "secret"),
            (KAITEN_BOARD_ID, "42"),
        ]));
        assert!(settings(config).validate().is_err());
    }

    #[test]
    fn request_timeout_must_outlast_kaiten_timeout() {
        let config = KaitenConfig::from_lookup(lookup(&[
            (KAITEN_API_URL, "https://example.kaiten.ru"),
            (KAITEN_API_TOKEN, "secret"),
            (KAITEN_BOARD_ID, "42"),
        ]));

        let equal = Settings {
            request_timeout: Duration::from_secs(10),
            kaiten_timeout: Duration::from_secs(10),
            ..settings(config.clone())
        };
        let err = equal.validate().unwrap_err().to_string();
        assert!(err.contains("REQUEST_TIMEOUT"));

        let shorter = Settings {
            request_timeout: Duration::from_secs(5),
            ..settings(config.clone())
        };
        assert!(shorter.validate().is_err());

        let longer = Settings {
            request_timeout: Duration::from_secs(30),
            ..settings(config)
        };
        assert!(longer.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_token() {
        let config = KaitenConfig {
            api_url: "https://example.kaiten.ru".to_string(),
            api_token: "supersecret".to_string(),
            board_id: "42".to_string(),
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("example.kaiten.ru"));
    }
}
