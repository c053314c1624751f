use std::env;
use std::str::FromStr;
use std::time::Duration;

use cutsheet_contracts::{CutsheetError, Result};

pub const DEFAULT_QUEUE_BASE: &str = "https://queue.fal.run";
pub const DEFAULT_STORAGE_BASE: &str = "https://rest.alpha.fal.ai";
pub const DEFAULT_GENERATE_ENDPOINT: &str = "fal-ai/nano-banana-pro/edit";
pub const DEFAULT_UPSCALE_ENDPOINT: &str = "fal-ai/ccsr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Push bytes to the provider's object store and pass its URL.
    #[default]
    Storage,
    /// Embed bytes as a base64 `data:` URL; no upload round-trip.
    Inline,
}

impl FromStr for UploadMode {
    type Err = CutsheetError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "storage" | "cdn" => Ok(Self::Storage),
            "inline" | "data-url" => Ok(Self::Inline),
            other => Err(CutsheetError::config(format!(
                "unsupported upload mode '{other}' (expected storage or inline)"
            ))),
        }
    }
}

/// Settings for the remote generation client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub queue_base: String,
    pub storage_base: String,
    pub generate_endpoint: String,
    pub upscale_endpoint: String,
    pub upload_mode: UploadMode,
    /// Per HTTP request.
    pub http_timeout: Duration,
    /// Overall deadline for one queued generation job.
    pub generate_timeout: Duration,
    /// Overall deadline for one queued upscale job.
    pub upscale_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            queue_base: DEFAULT_QUEUE_BASE.to_string(),
            storage_base: DEFAULT_STORAGE_BASE.to_string(),
            generate_endpoint: DEFAULT_GENERATE_ENDPOINT.to_string(),
            upscale_endpoint: DEFAULT_UPSCALE_ENDPOINT.to_string(),
            upload_mode: UploadMode::Storage,
            http_timeout: Duration::from_secs(60),
            generate_timeout: Duration::from_secs(300),
            upscale_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let base = |key: &str, default: &str| {
            value(key)
                .map(|raw| raw.trim_end_matches('/').to_string())
                .filter(|raw| !raw.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let defaults = Self::default();

        let mut config = Self {
            api_key: value("FAL_KEY").or_else(|| value("FAL_API_KEY")),
            queue_base: base("FAL_QUEUE_BASE", DEFAULT_QUEUE_BASE),
            storage_base: base("FAL_STORAGE_BASE", DEFAULT_STORAGE_BASE),
            generate_endpoint: value("CUTSHEET_GENERATE_ENDPOINT")
                .unwrap_or(defaults.generate_endpoint),
            upscale_endpoint: value("CUTSHEET_UPSCALE_ENDPOINT")
                .unwrap_or(defaults.upscale_endpoint),
            upload_mode: match value("CUTSHEET_UPLOAD_MODE") {
                Some(raw) => raw.parse()?,
                None => defaults.upload_mode,
            },
            http_timeout: seconds_setting(&value, "CUTSHEET_HTTP_TIMEOUT_SECS")?
                .unwrap_or(defaults.http_timeout),
            generate_timeout: seconds_setting(&value, "CUTSHEET_GENERATE_TIMEOUT_SECS")?
                .unwrap_or(defaults.generate_timeout),
            upscale_timeout: seconds_setting(&value, "CUTSHEET_UPSCALE_TIMEOUT_SECS")?
                .unwrap_or(defaults.upscale_timeout),
            poll_interval: defaults.poll_interval,
        };
        if let Some(raw) = value("CUTSHEET_POLL_INTERVAL_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                CutsheetError::config(format!("CUTSHEET_POLL_INTERVAL_MS is not a number: {raw}"))
            })?;
            config.poll_interval = Duration::from_millis(millis.clamp(200, 5000));
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
        {
            self.api_key = Some(key);
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The configured key, or a config error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| CutsheetError::config("FAL_KEY (or FAL_API_KEY) not set"))
    }
}

fn seconds_setting(
    value: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>> {
    let Some(raw) = value(key) else {
        return Ok(None);
    };
    let seconds: f64 = raw
        .parse()
        .map_err(|_| CutsheetError::config(format!("{key} is not a number: {raw}")))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(CutsheetError::config(format!("{key} must be positive: {raw}")));
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|_| CutsheetError::config(format!("{key} is out of range: {raw}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{ClientConfig, UploadMode, DEFAULT_QUEUE_BASE};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults_without_key() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config, ClientConfig::default());
        assert!(config.require_api_key().is_err());
        Ok(())
    }

    #[test]
    fn fal_api_key_is_a_fallback_for_fal_key() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[("FAL_API_KEY", " k2 ")]))?;
        assert_eq!(config.api_key.as_deref(), Some("k2"));

        let config =
            ClientConfig::from_lookup(lookup(&[("FAL_KEY", "k1"), ("FAL_API_KEY", "k2")]))?;
        assert_eq!(config.require_api_key()?, "k1");
        Ok(())
    }

    #[test]
    fn overrides_are_trimmed_and_clamped() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[
            ("FAL_QUEUE_BASE", "http://127.0.0.1:9/queue/"),
            ("CUTSHEET_UPLOAD_MODE", "inline"),
            ("CUTSHEET_GENERATE_TIMEOUT_SECS", "90"),
            ("CUTSHEET_POLL_INTERVAL_MS", "5"),
        ]))?;
        assert_eq!(config.queue_base, "http://127.0.0.1:9/queue");
        assert_eq!(config.upload_mode, UploadMode::Inline);
        assert_eq!(config.generate_timeout, Duration::from_secs(90));
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        Ok(())
    }

    #[test]
    fn blank_base_falls_back_to_default() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[("FAL_QUEUE_BASE", "  ")]))?;
        assert_eq!(config.queue_base, DEFAULT_QUEUE_BASE);
        Ok(())
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        let err = ClientConfig::from_lookup(lookup(&[("CUTSHEET_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
        let err = ClientConfig::from_lookup(lookup(&[("CUTSHEET_UPSCALE_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn oversized_timeouts_are_config_errors() {
        for key in [
            "CUTSHEET_HTTP_TIMEOUT_SECS",
            "CUTSHEET_GENERATE_TIMEOUT_SECS",
            "CUTSHEET_UPSCALE_TIMEOUT_SECS",
        ] {
            let err = ClientConfig::from_lookup(lookup(&[(key, "1e300")])).unwrap_err();
            assert_eq!(err.kind(), "config");
            assert!(err.to_string().contains("out of range"), "{err}");
        }
    }

    #[test]
    fn explicit_key_overrides_environment() {
        let config = ClientConfig::default()
            .with_api_key(Some("cli-key".to_string()))
            .with_api_key(Some("   ".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("cli-key"));
    }
}
