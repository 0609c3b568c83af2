use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::path::PathBuf;

use nonzero_ext::nonzero;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
pub const DEFAULT_STATIC_DIR: &str = "frontend/dist";
pub fn default_contact_rate() -> NonZeroU32 {
    nonzero!(5u32)
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} is not valid: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{0} must be set when SMTP_HOST is set")]
    Missing(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Sender address on outgoing mail, e.g. `Studio <hello@studio.example>`.
    pub from: String,
    pub inbox: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub contact_rate_per_minute: NonZeroU32,
    /// Peers whose `X-Forwarded-For` is believed. Empty means the socket
    /// address is the client.
    pub trusted_proxies: Vec<IpAddr>,
    /// Without SMTP, contact requests are only written to the log.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let static_dir = lookup("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let contact_rate_per_minute = match lookup("CONTACT_RATE_PER_MINUTE") {
            None => default_contact_rate(),
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "CONTACT_RATE_PER_MINUTE",
                    reason: format!("expected a positive integer, got {:?}", raw),
                })?,
        };

        let trusted_proxies = lookup("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                    key: "TRUSTED_PROXIES",
                    reason: format!("{:?}: {}", entry, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let smtp = match lookup("SMTP_HOST") {
            None => None,
            Some(host) => {
                let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
                Some(SmtpConfig {
                    host,
                    username: required("SMTP_USERNAME")?,
                    password: required("SMTP_PASSWORD")?,
                    from: required("CONTACT_FROM")?,
                    inbox: required("CONTACT_INBOX")?,
                })
            }
        };

        Ok(Self {
            bind_addr,
            static_dir,
            contact_rate_per_minute,
            trusted_proxies,
            smtp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.static_dir, PathBuf::from(DEFAULT_STATIC_DIR));
        assert_eq!(config.contact_rate_per_minute.get(), 5);
        assert!(config.smtp.is_none());
        assert!(config.trusted_proxies.is_empty());
    }

    #[test]
    fn trusted_proxies_are_a_comma_list() {
        let cfg = config(&[("TRUSTED_PROXIES", "127.0.0.1, ::1")]).unwrap();
        assert_eq!(
            cfg.trusted_proxies,
            vec!["127.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert!(matches!(
            config(&[("TRUSTED_PROXIES", "127.0.0.1,proxy.local")]),
            Err(ConfigError::Invalid { key: "TRUSTED_PROXIES", .. })
        ));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[("CONTACT_RATE_PER_MINUTE", "0")]),
            Err(ConfigError::Invalid { key: "CONTACT_RATE_PER_MINUTE", .. })
        ));
        assert!(matches!(
            config(&[("BIND_ADDR", "localhost")]),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
    }

    #[test]
    fn smtp_needs_every_field() {
        assert_eq!(
            config(&[("SMTP_HOST", "smtp.example"), ("SMTP_USERNAME", "u"), ("SMTP_PASSWORD", "p")]),
            Err(ConfigError::Missing("CONTACT_FROM"))
        );
        let full = config(&[
            ("SMTP_HOST", "smtp.example"),
            ("SMTP_USERNAME", "u"),
            ("SMTP_PASSWORD", "p"),
            ("CONTACT_FROM", "Studio <hello@studio.example>"),
            ("CONTACT_INBOX", "team@studio.example"),
        ])
        .unwrap();
        assert_eq!(full.smtp.map(|s| s.inbox), Some("team@studio.example".to_string()));
    }
}
