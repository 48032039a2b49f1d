//! Client configuration
//!
//! Configuration is loadable from TOML with per-field defaults, or built in
//! code. Key material (whitelist key) is never read from files; it is set
//! programmatically after loading.

use serde::{Deserialize, Serialize};

use crate::keys::{PrivateKey, PublicKey};
use crate::types::{Commitment, Environment, LedgerVersion};

/// Default endpoint for the test environment.
pub const TEST_ENDPOINT: &str = "api.quarknet.dev:443";

/// Default endpoint for the production environment.
pub const PROD_ENDPOINT: &str = "api.quarknet.net:443";

/// Four-character asset code of the pre-rebase legacy asset.
pub(crate) const LEGACY2_ASSET_CODE: [u8; 4] = [b'Q', b'R', b'K', 0];

// Fixed issuer accounts for the pre-rebase legacy asset.
const LEGACY2_TEST_ISSUER: [u8; 32] = [
    0x1c, 0x62, 0x09, 0xf1, 0x4b, 0x30, 0xa7, 0x55, 0x9e, 0x0c, 0x21, 0xd7, 0x6e, 0x4f, 0xa2,
    0x0d, 0x83, 0x5a, 0xc6, 0x44, 0x07, 0x9b, 0x1d, 0xe8, 0x26, 0xf0, 0x33, 0x91, 0x5c, 0xab,
    0x72, 0x4e,
];
const LEGACY2_PROD_ISSUER: [u8; 32] = [
    0x6d, 0x13, 0xe4, 0x2a, 0x98, 0x07, 0xcf, 0x61, 0x24, 0xb9, 0x50, 0x8e, 0x1a, 0xd5, 0x3b,
    0xf7, 0x40, 0x2c, 0x75, 0xd2, 0x09, 0xee, 0x68, 0x81, 0x5f, 0x04, 0xa3, 0xc8, 0x37, 0x96,
    0x0b, 0xda,
];

/// Signing domain separators for the legacy ledger.
pub(crate) fn network_passphrase(env: Environment, version: LedgerVersion) -> &'static str {
    match (env, version) {
        (Environment::Test, LedgerVersion::Legacy2) => "Quarknet Playground ; June 2018",
        (Environment::Prod, LedgerVersion::Legacy2) => "Public Global Quarknet ; June 2018",
        (Environment::Test, _) => "Quarknet Testnet ; December 2018",
        (Environment::Prod, _) => "Quarknet Mainnet ; December 2018",
    }
}

/// Fixed asset issuer for the pre-rebase legacy asset.
pub(crate) fn legacy2_issuer(env: Environment) -> PublicKey {
    match env {
        Environment::Test => PublicKey::new(LEGACY2_TEST_ISSUER),
        Environment::Prod => PublicKey::new(LEGACY2_PROD_ISSUER),
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Target environment.
    pub environment: Environment,

    /// Starting ledger version (2-4). Upgraded in place when the server
    /// signals the legacy ledger is gone.
    #[serde(default = "default_ledger_version")]
    pub ledger_version: u8,

    /// App index for structured memos. Zero disables structured memos and
    /// forbids invoices.
    #[serde(default)]
    pub app_index: u16,

    /// Max retries for transient transport errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Max attempts for the bounded nonce-retry loop. Independent from
    /// `max_retries`.
    #[serde(default = "default_max_nonce_retries")]
    pub max_nonce_retries: u32,

    /// Minimum backoff delay for transient retries, in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum backoff delay for transient retries, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Default commitment for token-ledger requests.
    #[serde(default)]
    pub default_commitment: Commitment,

    /// Endpoint override; defaults to the environment's endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Overall per-call deadline, in seconds. `None` disables the deadline.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Key co-signing legacy transactions not already signed by it.
    #[serde(skip)]
    pub whitelist_key: Option<PrivateKey>,
}

// Default value functions
fn default_ledger_version() -> u8 {
    3
}
fn default_max_retries() -> u32 {
    10
}
fn default_max_nonce_retries() -> u32 {
    3
}
fn default_min_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    10_000
}

impl ClientConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ledger_version: default_ledger_version(),
            app_index: 0,
            max_retries: default_max_retries(),
            max_nonce_retries: default_max_nonce_retries(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            default_commitment: Commitment::default(),
            endpoint: None,
            request_timeout_secs: None,
            whitelist_key: None,
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn with_app_index(mut self, app_index: u16) -> Self {
        self.app_index = app_index;
        self
    }

    pub fn with_ledger_version(mut self, version: LedgerVersion) -> Self {
        self.ledger_version = version.value();
        self
    }

    pub fn with_whitelist_key(mut self, key: PrivateKey) -> Self {
        self.whitelist_key = Some(key);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_nonce_retries(mut self, max_nonce_retries: u32) -> Self {
        self.max_nonce_retries = max_nonce_retries;
        self
    }

    pub fn resolved_endpoint(&self) -> &str {
        match &self.endpoint {
            Some(e) => e,
            None => match self.environment {
                Environment::Test => TEST_ENDPOINT,
                Environment::Prod => PROD_ENDPOINT,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new(Environment::Test);
        assert_eq!(config.ledger_version, 3);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.max_nonce_retries, 3);
        assert_eq!(config.default_commitment, Commitment::Single);
        assert_eq!(config.resolved_endpoint(), TEST_ENDPOINT);
    }

    #[test]
    fn test_toml_partial_overrides() {
        let config: ClientConfig = toml::from_str(
            r#"
            environment = "prod"
            app_index = 7
            max_nonce_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Prod);
        assert_eq!(config.app_index, 7);
        assert_eq!(config.max_nonce_retries, 5);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.resolved_endpoint(), PROD_ENDPOINT);
    }

    #[test]
    fn test_endpoint_override() {
        let mut config = ClientConfig::new(Environment::Test);
        config.endpoint = Some("localhost:8085".to_string());
        assert_eq!(config.resolved_endpoint(), "localhost:8085");
    }

    #[test]
    fn test_legacy2_issuers_differ_per_environment() {
        assert_ne!(
            legacy2_issuer(Environment::Test),
            legacy2_issuer(Environment::Prod)
        );
    }
}
