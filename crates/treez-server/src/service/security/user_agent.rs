//! User agent parsing into session device metadata.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of generated device identifiers.
const DEVICE_ID_LENGTH: usize = 21;

/// Placeholder for an unrecognized browser or operating system.
const UNKNOWN: &str = "Unknown";

/// Device metadata recorded with every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Random identifier of the device.
    pub device_id: String,
    /// `"<OS> - <Browser>"`.
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// User agent parsing service.
#[derive(Clone)]
pub struct UserAgentParser {
    parser: Arc<woothee::parser::Parser>,
}

impl std::fmt::Debug for UserAgentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAgentParser").finish_non_exhaustive()
    }
}

impl UserAgentParser {
    /// Creates a new instance of the [`UserAgentParser`] service.
    pub fn new() -> Self {
        Self {
            parser: Arc::new(woothee::parser::Parser::new()),
        }
    }

    /// Builds the device metadata of a request.
    ///
    /// ```ignore
    /// let parser = UserAgentParser::new();
    /// let device = parser.device_info("Mozilla/5.0 (Windows NT 10.0; ...) Firefox/121.0", None);
    /// assert_eq!(device.device_name, "Windows 10 - Firefox");
    /// ```
    pub fn device_info(&self, user_agent: &str, ip: Option<String>) -> DeviceInfo {
        let (browser, os) = match self.parser.parse(user_agent) {
            Some(result) => (known(result.name), known(result.os)),
            None => (None, None),
        };

        let device_name = format!(
            "{} - {}",
            os.as_deref().unwrap_or(UNKNOWN),
            browser.as_deref().unwrap_or(UNKNOWN),
        );

        DeviceInfo {
            device_id: generate_device_id(),
            device_name,
            browser,
            os,
            ip,
        }
    }
}

impl Default for UserAgentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn known(value: &str) -> Option<String> {
    (!value.is_empty() && value != woothee::woothee::VALUE_UNKNOWN).then(|| value.to_owned())
}

fn generate_device_id() -> String {
    let mut rng = rand::rng();
    (0..DEVICE_ID_LENGTH)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firefox_on_windows() {
        let parser = UserAgentParser::new();
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
        let device = parser.device_info(ua, Some("203.0.113.7".into()));

        assert_eq!(device.device_name, "Windows 10 - Firefox");
        assert_eq!(device.browser.as_deref(), Some("Firefox"));
        assert_eq!(device.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(device.device_id.len(), DEVICE_ID_LENGTH);
    }

    #[test]
    fn unknown_agent() {
        let parser = UserAgentParser::new();
        let device = parser.device_info("", None);

        assert_eq!(device.device_name, "Unknown - Unknown");
        assert!(device.browser.is_none());
        assert!(device.os.is_none());
    }

    #[test]
    fn device_ids_differ() {
        let parser = UserAgentParser::new();
        let first = parser.device_info("curl/8.0", None);
        let second = parser.device_info("curl/8.0", None);
        assert_ne!(first.device_id, second.device_id);
    }
}
