//! ============================================================================
//! Configuration - Environment-driven settings
//! ============================================================================
//! PEERTASK_API_URL             REST backend base URL
//! PEERTASK_BLOG_URL            hosted blog datastore URL
//! PEERTASK_BLOG_KEY            hosted blog datastore API key
//! PEERTASK_DB_PATH             local database file
//! PEERTASK_POLL_SECS           message subscription interval
//! PEERTASK_RETRY_MAX_ATTEMPTS  read retry ceiling
//! PEERTASK_REJECT_OTHERS       reject non-chosen applicants on assignment
//! ============================================================================

use std::time::Duration;
use tracing::warn;

use crate::backend::http::DEFAULT_API_URL;
use crate::lifecycle::RejectionPolicy;
use crate::messaging::DEFAULT_POLL_INTERVAL;
use crate::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct PeerTaskConfig {
    pub api_url: String,
    pub blog_url: Option<String>,
    pub blog_key: Option<String>,
    pub db_path: Option<String>,
    pub poll_interval: Duration,
    pub retry: RetryConfig,
    pub rejection_policy: RejectionPolicy,
}

impl Default for PeerTaskConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            blog_url: None,
            blog_key: None,
            db_path: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryConfig::default(),
            rejection_policy: RejectionPolicy::default(),
        }
    }
}

impl PeerTaskConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup. Unparseable values fall back to defaults
    /// with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let poll_interval = match get("PEERTASK_POLL_SECS").map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
            Some(_) => {
                warn!("PEERTASK_POLL_SECS must be a positive integer, using default");
                defaults.poll_interval
            }
            None => defaults.poll_interval,
        };

        let mut retry = defaults.retry.clone();
        match get("PEERTASK_RETRY_MAX_ATTEMPTS").map(|v| v.parse::<u32>()) {
            Some(Ok(n)) if n > 0 => retry.max_attempts = n,
            Some(_) => warn!("PEERTASK_RETRY_MAX_ATTEMPTS must be a positive integer, using default"),
            None => {}
        }

        let rejection_policy = match get("PEERTASK_REJECT_OTHERS").as_deref() {
            Some("1") | Some("true") | Some("yes") => RejectionPolicy::RejectOthers,
            Some("0") | Some("false") | Some("no") | None => RejectionPolicy::LeavePending,
            Some(other) => {
                warn!("Unrecognised PEERTASK_REJECT_OTHERS value '{}', leaving applicants pending", other);
                RejectionPolicy::LeavePending
            }
        };

        Self {
            api_url: get("PEERTASK_API_URL").unwrap_or(defaults.api_url),
            blog_url: get("PEERTASK_BLOG_URL"),
            blog_key: get("PEERTASK_BLOG_KEY"),
            db_path: get("PEERTASK_DB_PATH"),
            poll_interval,
            retry,
            rejection_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> PeerTaskConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PeerTaskConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.api_url, "http://localhost:3000/api/v1");
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.rejection_policy, RejectionPolicy::LeavePending);
        assert!(config.blog_url.is_none());
    }

    #[test]
    fn test_values_read() {
        let config = config_from(&[
            ("PEERTASK_API_URL", "https://api.peertask.app/api/v1"),
            ("PEERTASK_BLOG_URL", "https://blog.example.co"),
            ("PEERTASK_BLOG_KEY", "anon-key"),
            ("PEERTASK_POLL_SECS", "10"),
            ("PEERTASK_RETRY_MAX_ATTEMPTS", "2"),
            ("PEERTASK_REJECT_OTHERS", "true"),
        ]);
        assert_eq!(config.api_url, "https://api.peertask.app/api/v1");
        assert_eq!(config.blog_key.as_deref(), Some("anon-key"));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.rejection_policy, RejectionPolicy::RejectOthers);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("PEERTASK_API_URL", "   "),
            ("PEERTASK_POLL_SECS", "0"),
            ("PEERTASK_RETRY_MAX_ATTEMPTS", "many"),
            ("PEERTASK_REJECT_OTHERS", "maybe"),
        ]);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.rejection_policy, RejectionPolicy::LeavePending);
    }
}
