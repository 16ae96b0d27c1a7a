//! Configuration
//!
//! Read from the environment (and a `.env` file, when present). Every value has a default, so
//! an empty environment talks to the hosted backend.

use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::HttpGatewayConfig;
use crate::services::fulfillment::{TransitionPolicy, DEFAULT_PRODUCT_LIMIT};
use crate::{Result, StorefrontError};

pub const DEFAULT_STORE_API: &str = "https://x8ki-letl-twmt.n7.xano.io/api:MLGOX1mg";
pub const DEFAULT_AUTH_API: &str = "https://x8ki-letl-twmt.n7.xano.io/api:IFSIbhTM";
pub const DEFAULT_STATE_FILE: &str = ".kamehouse/state.json";

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub store_api: String,
    pub auth_api: String,
    /// Token lifetime assumed when the token carries no readable `exp` claim.
    pub token_ttl: chrono::Duration,
    /// How long before expiry the user is offered a renewal.
    pub renewal_margin: chrono::Duration,
    /// Pause between a placed order's confirmation and the cart being cleared.
    pub confirmation_delay: Duration,
    pub state_file: PathBuf,
    pub fulfillment_policy: TransitionPolicy,
    pub admin_product_limit: u32,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            store_api: DEFAULT_STORE_API.to_string(),
            auth_api: DEFAULT_AUTH_API.to_string(),
            token_ttl: chrono::Duration::seconds(86_400),
            renewal_margin: chrono::Duration::seconds(120),
            confirmation_delay: Duration::from_millis(1500),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            fulfillment_policy: TransitionPolicy::Strict,
            admin_product_limit: DEFAULT_PRODUCT_LIMIT,
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|name| std::env::var(name).ok())?;
        tracing::debug!(store_api = %config.store_api, auth_api = %config.auth_api, state_file = %config.state_file.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(get_env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let number = |name: &str| -> Result<Option<u64>> {
            get_env(name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().parse::<u64>().map_err(|e| StorefrontError::Config(format!("Invalid {name}: {e}"))))
                .transpose()
        };
        let seconds = |v: u64| chrono::Duration::seconds(i64::try_from(v).unwrap_or(i64::MAX));

        Ok(Self {
            store_api: base_url(get_env("KAMEHOUSE_STORE_API"), DEFAULT_STORE_API),
            auth_api: base_url(get_env("KAMEHOUSE_AUTH_API"), DEFAULT_AUTH_API),
            token_ttl: number("KAMEHOUSE_TOKEN_TTL_SECS")?.map_or(defaults.token_ttl, seconds),
            renewal_margin: number("KAMEHOUSE_RENEWAL_MARGIN_SECS")?.map_or(defaults.renewal_margin, seconds),
            confirmation_delay: number("KAMEHOUSE_CONFIRMATION_DELAY_MS")?.map_or(defaults.confirmation_delay, Duration::from_millis),
            state_file: get_env("KAMEHOUSE_STATE_FILE").filter(|v| !v.trim().is_empty()).map_or(defaults.state_file, PathBuf::from),
            fulfillment_policy: get_env("KAMEHOUSE_FULFILLMENT_POLICY").map(|v| v.parse::<TransitionPolicy>()).transpose()?.unwrap_or_default(),
            admin_product_limit: number("KAMEHOUSE_ADMIN_PRODUCT_LIMIT")?
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
                .unwrap_or(defaults.admin_product_limit),
        })
    }

    pub fn gateway(&self) -> HttpGatewayConfig {
        HttpGatewayConfig { store_base: self.store_api.clone(), auth_base: self.auth_api.clone() }
    }
}

/// Only values that look like URLs override the default.
fn base_url(value: Option<String>, default: &str) -> String {
    value.map(|v| v.trim().to_string()).filter(|v| v.starts_with("http")).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use testresult::TestResult;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() -> TestResult {
        let config = StorefrontConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config.store_api, DEFAULT_STORE_API);
        assert_eq!(config.renewal_margin, chrono::Duration::minutes(2));
        assert_eq!(config.confirmation_delay, Duration::from_millis(1500));
        assert_eq!(config.fulfillment_policy, TransitionPolicy::Strict);
        assert_eq!(config.admin_product_limit, 200);
        Ok(())
    }

    #[test]
    fn test_overrides() -> TestResult {
        let config = StorefrontConfig::from_lookup(lookup(&[
            ("KAMEHOUSE_STORE_API", "http://localhost:9000/api"),
            ("KAMEHOUSE_AUTH_API", "localhost:9000/auth"),
            ("KAMEHOUSE_TOKEN_TTL_SECS", "60"),
            ("KAMEHOUSE_CONFIRMATION_DELAY_MS", "0"),
            ("KAMEHOUSE_FULFILLMENT_POLICY", "lenient"),
            ("KAMEHOUSE_STATE_FILE", "/tmp/kh.json"),
        ]))?;
        assert_eq!(config.store_api, "http://localhost:9000/api");
        assert_eq!(config.auth_api, DEFAULT_AUTH_API);
        assert_eq!(config.token_ttl, chrono::Duration::seconds(60));
        assert_eq!(config.confirmation_delay, Duration::ZERO);
        assert_eq!(config.fulfillment_policy, TransitionPolicy::Lenient);
        assert_eq!(config.state_file, PathBuf::from("/tmp/kh.json"));
        Ok(())
    }

    #[test]
    fn test_invalid_number_is_a_config_error() {
        let result = StorefrontConfig::from_lookup(lookup(&[("KAMEHOUSE_RENEWAL_MARGIN_SECS", "soon")]));
        assert!(matches!(result, Err(StorefrontError::Config(_))));
    }
}
