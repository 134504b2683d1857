//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VNPAY_TMN_CODE` - VNPAY merchant (terminal) code
//! - `VNPAY_HASH_SECRET` - VNPAY HMAC signing secret (high entropy)
//!
//! ## Optional
//! - `LAVANDE_API_BASE_URL` - Storefront API base (default: `http://localhost:3055/v1/api`)
//! - `LAVANDE_DATA_DIR` - Directory for local key-value storage (default: `.lavande`)
//! - `VNPAY_GATEWAY_URL` - Hosted payment page (default: VNPAY sandbox)
//! - `VNPAY_RETURN_URL` - Return URL the gateway redirects back to
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Default storefront API base, matching the development server.
const DEFAULT_API_BASE_URL: &str = "http://localhost:3055/v1/api";

/// VNPAY sandbox payment page.
const DEFAULT_GATEWAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

/// Return URL registered with the gateway for this merchant.
const DEFAULT_RETURN_URL: &str = "http://localhost:5173/vnpay_return";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Lavande client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the storefront API, including the `/v1/api` prefix.
    pub api_base_url: String,
    /// Directory holding the local key-value store (credentials, caches).
    pub data_dir: PathBuf,
    /// VNPAY gateway configuration.
    pub vnpay: VnpayConfig,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

/// VNPAY payment gateway configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct VnpayConfig {
    /// Merchant terminal code issued by VNPAY.
    pub tmn_code: String,
    /// Pre-shared HMAC-SHA512 signing secret.
    pub hash_secret: SecretString,
    /// Hosted payment page the client redirects to.
    pub gateway_url: String,
    /// URL the gateway navigates back to with the payment result.
    pub return_url: String,
}

impl std::fmt::Debug for VnpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnpayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"[REDACTED]")
            .field("gateway_url", &self.gateway_url)
            .field("return_url", &self.return_url)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = normalize_base_url(get_env_or_default(
            "LAVANDE_API_BASE_URL",
            DEFAULT_API_BASE_URL,
        ));
        let data_dir = PathBuf::from(get_env_or_default("LAVANDE_DATA_DIR", ".lavande"));
        let vnpay = VnpayConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_base_url,
            data_dir,
            vnpay,
            sentry_dsn,
        })
    }
}

impl VnpayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            tmn_code: get_required_env("VNPAY_TMN_CODE")?,
            hash_secret: get_validated_secret("VNPAY_HASH_SECRET")?,
            gateway_url: get_env_or_default("VNPAY_GATEWAY_URL", DEFAULT_GATEWAY_URL),
            return_url: get_env_or_default("VNPAY_RETURN_URL", DEFAULT_RETURN_URL),
        })
    }

    /// The marker looked for in navigation URLs to detect the gateway's
    /// return redirect: the last path segment of the configured return URL.
    #[must_use]
    pub fn return_marker(&self) -> &str {
        self.return_url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("vnpay_return")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Strip a trailing slash so endpoint paths can always be appended as `/path`.
fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real signing secrets have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret issued by the gateway."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-hash-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // Shaped like a real VNPAY sandbox secret
        let result = validate_secret_strength("HUSXH1330A8TUE57O1UAS2Q5KBJYL1GD", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_normalize_base_url_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://localhost:3055/v1/api/".to_string()),
            "http://localhost:3055/v1/api"
        );
        assert_eq!(
            normalize_base_url("http://localhost:3055/v1/api".to_string()),
            "http://localhost:3055/v1/api"
        );
    }

    #[test]
    fn test_return_marker_from_return_url() {
        let config = VnpayConfig {
            tmn_code: "MHANHND2".to_string(),
            hash_secret: SecretString::from("x".repeat(32)),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            return_url: "https://shop.lavande.vn/payment/done".to_string(),
        };
        assert_eq!(config.return_marker(), "done");

        let default = VnpayConfig {
            return_url: DEFAULT_RETURN_URL.to_string(),
            ..config
        };
        assert_eq!(default.return_marker(), "vnpay_return");
    }

    #[test]
    fn test_vnpay_config_debug_redacts_secret() {
        let config = VnpayConfig {
            tmn_code: "MHANHND2".to_string(),
            hash_secret: SecretString::from("super_secret_hash_key_value"),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            return_url: DEFAULT_RETURN_URL.to_string(),
        };

        let debug_output = format!("{config:?}");

        // Public fields should be visible
        assert!(debug_output.contains("MHANHND2"));
        assert!(debug_output.contains("sandbox.vnpayment.vn"));

        // Secret fields should be redacted
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_hash_key_value"));
    }
}
