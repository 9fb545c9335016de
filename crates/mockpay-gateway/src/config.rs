use std::time::Duration;

use crate::webhook::RetryPolicy;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_RATE_LIMIT_RPM: u64 = 120;
const MIN_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct GatewayConfig {
    /// HMAC secret for webhook signatures (required)
    pub webhook_secret: Vec<u8>,
    /// Bearer token sent to the operator with every webhook
    pub service_auth_token: Option<String>,
    /// Webhook retry policy
    pub retry: RetryPolicy,
    /// Simulated processing time before auto-completion
    pub settlement_delay: Duration,
    /// Server port
    pub port: u16,
    /// Rate limit requests per minute per IP
    pub rate_limit_rpm: u64,
    /// CORS allowed origins (empty = localhost only)
    pub allowed_origins: Vec<String>,
    /// Bearer token required for /metrics (None = forbidden unless made public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("webhook_secret", &"[REDACTED]")
            .field(
                "service_auth_token",
                &self.service_auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("retry", &self.retry)
            .field("settlement_delay", &self.settlement_delay)
            .field("port", &self.port)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("allowed_origins", &self.allowed_origins)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment
    /// in production, a map in tests). Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Required: webhook signing secret
        let webhook_secret = get("PAYMENT_WEBHOOK_SECRET")
            .map(String::into_bytes)
            .ok_or(ConfigError::MissingRequired("PAYMENT_WEBHOOK_SECRET"))?;
        if webhook_secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                "PAYMENT_WEBHOOK_SECRET is only {} bytes (minimum {} recommended), \
                 use `openssl rand -hex 32` to generate a secure secret",
                webhook_secret.len(),
                MIN_SECRET_LEN
            );
        }

        // Optional: operator auth token
        let service_auth_token = get("SERVICE_AUTH_TOKEN");

        // Optional: retry policy
        let defaults = RetryPolicy::default();
        let max_retries = match get("WEBHOOK_MAX_RETRIES") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::Invalid("WEBHOOK_MAX_RETRIES", v))?,
            None => defaults.max_retries,
        };
        let retry_delay = parse_seconds(get("WEBHOOK_RETRY_DELAY"), "WEBHOOK_RETRY_DELAY")?
            .unwrap_or(defaults.retry_delay);
        let timeout = parse_seconds(get("WEBHOOK_TIMEOUT"), "WEBHOOK_TIMEOUT")?
            .unwrap_or(defaults.timeout);
        if timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "WEBHOOK_TIMEOUT",
                get("WEBHOOK_TIMEOUT").unwrap_or_default(),
            ));
        }

        let settlement_delay = parse_seconds(get("SETTLEMENT_DELAY"), "SETTLEMENT_DELAY")?
            .unwrap_or(mockpay::DEFAULT_SETTLEMENT_DELAY);

        // Optional: server
        let port = match get("PORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT", p))?,
            None => DEFAULT_PORT,
        };

        // The governor divides a minute by this value
        let rate_limit_rpm = match get("RATE_LIMIT_RPM") {
            Some(r) => match r.trim().parse::<u64>() {
                Ok(rpm) if rpm > 0 => rpm,
                _ => return Err(ConfigError::Invalid("RATE_LIMIT_RPM", r)),
            },
            None => DEFAULT_RATE_LIMIT_RPM,
        };

        let allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let metrics_token = get("METRICS_TOKEN");
        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is disabled unless MOCKPAY_PUBLIC_METRICS=true");
        }

        Ok(Self {
            webhook_secret,
            service_auth_token,
            retry: RetryPolicy {
                max_retries,
                retry_delay,
                timeout,
            },
            settlement_delay,
            port,
            rate_limit_rpm,
            allowed_origins,
            metrics_token,
        })
    }
}

/// Parse a non-negative, finite number of seconds such as `"1.5"`.
fn parse_seconds(value: Option<String>, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(key, raw.clone()))?;
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| ConfigError::Invalid(key, raw))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}
