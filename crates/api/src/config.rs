//! Application configuration loaded from environment variables.

use carrier::GhnConfig;
use gateway::VnpayConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `DATABASE_URL` — Postgres URL; in-memory store when unset
/// - `VNP_TMN_CODE` / `VNP_HASH_SECRET` / `VNP_PAY_URL` / `VNP_RETURN_URL`
/// - `GHN_API_URL` / `GHN_TOKEN` / `GHN_SHOP_ID` / `GHN_WEBHOOK_SECRET`
/// - `WEBHOOK_RETENTION_DAYS` — durable webhook retention (default: 30)
/// - `SWEEP_INTERVAL_SECS` — background sweep cadence (default: 60)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub gateway: VnpayConfig,
    pub carrier: GhnConfig,
    pub carrier_webhook_secret: Option<String>,
    pub retention_days: i64,
    pub sweep_interval_secs: u64,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let gateway_defaults = VnpayConfig::default();
        let carrier_defaults = GhnConfig::default();

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: std::env::var("DATABASE_URL").ok(),
            gateway: VnpayConfig {
                tmn_code: env_or("VNP_TMN_CODE", ""),
                secret: env_or("VNP_HASH_SECRET", ""),
                pay_url: env_or("VNP_PAY_URL", &gateway_defaults.pay_url),
                return_url: env_or("VNP_RETURN_URL", &gateway_defaults.return_url),
                version: gateway_defaults.version,
            },
            carrier: GhnConfig {
                base_url: env_or("GHN_API_URL", &carrier_defaults.base_url),
                token: env_or("GHN_TOKEN", ""),
                shop_id: env_or("GHN_SHOP_ID", ""),
                cache_ttl_secs: std::env::var("GHN_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(carrier_defaults.cache_ttl_secs),
            },
            carrier_webhook_secret: std::env::var("GHN_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            retention_days: std::env::var("WEBHOOK_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            gateway: VnpayConfig::default(),
            carrier: GhnConfig::default(),
            carrier_webhook_secret: None,
            retention_days: 30,
            sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.retention_days, 30);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
