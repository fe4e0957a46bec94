//! Relay configuration: optional YAML tunables plus the upstream endpoint.

use anyhow::{bail, Context, Result};
use pumprelay_hub::HubConfig;
use pumprelay_observability::LogConfig;
use pumprelay_stream::UpstreamConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Minimum length accepted for the node credential.
pub const MIN_KEY_LEN: usize = 8;

/// Top-level YAML document.
///
/// ```yaml
/// upstream:
///   reconnect_delay_ms: 2000
///   subscription:
///     mentions: ["6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"]
/// hub:
///   fanout: topic
///   format: raw
/// log:
///   level: info
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl RelayConfig {
    /// Defaults when `path` is `None`; a given path must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Reject a missing or implausibly short credential.
pub fn validate_key(key: Option<&str>) -> Result<&str> {
    match key.map(str::trim) {
        None | Some("") => bail!("HELIUS_KEY is not set"),
        Some(k) if k.chars().count() < MIN_KEY_LEN => {
            bail!("HELIUS_KEY is too short (need at least {MIN_KEY_LEN} characters)")
        }
        Some(k) => Ok(k),
    }
}

/// Append the credential to `base` as the `api-key` query parameter.
pub fn upstream_url(base: &str, key: &str) -> Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("invalid upstream url {base:?}"))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => bail!("upstream url must use ws or wss, got {other}"),
    }
    url.query_pairs_mut().append_pair("api-key", key);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumprelay_hub::FanoutMode;

    #[test]
    fn url_carries_key_as_query() {
        let url = upstream_url("wss://mainnet.helius-rpc.com/", "abcdefgh12").unwrap();
        assert_eq!(url, "wss://mainnet.helius-rpc.com/?api-key=abcdefgh12");
    }

    #[test]
    fn url_rejects_http() {
        assert!(upstream_url("https://mainnet.helius-rpc.com/", "abcdefgh").is_err());
        assert!(upstream_url("not a url", "abcdefgh").is_err());
    }

    #[test]
    fn short_or_missing_key_is_fatal() {
        assert!(validate_key(None).is_err());
        assert!(validate_key(Some("   ")).is_err());
        assert!(validate_key(Some("1234567")).is_err());
        assert_eq!(validate_key(Some(" 12345678 ")).unwrap(), "12345678");
    }

    #[test]
    fn yaml_sections_are_optional() {
        let c = RelayConfig::from_yaml("hub:\n  fanout: all\n").unwrap();
        assert_eq!(c.hub.fanout, FanoutMode::All);
        assert_eq!(c.upstream.event_queue_capacity, 1024);
        assert_eq!(c.log.level, "info");

        let empty = RelayConfig::from_yaml("").unwrap();
        assert_eq!(
            empty.upstream.subscription.mentions,
            vec![pumprelay_core::DEFAULT_PROGRAM_ADDRESS.to_string()]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("pumprelay-does-not-exist.yaml");
        assert!(RelayConfig::load(Some(&path)).is_err());
        assert!(RelayConfig::load(None).is_ok());
    }

    #[test]
    fn bad_yaml_is_an_error() {
        assert!(RelayConfig::from_yaml("hub: [1, 2").is_err());
        assert!(RelayConfig::from_yaml("hub:\n  fanout: sideways\n").is_err());
    }
}
