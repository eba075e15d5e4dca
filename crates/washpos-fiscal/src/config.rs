//! Runtime configuration loaded from the environment.
//!
//! | Variable                     | Default                 |
//! |------------------------------|-------------------------|
//! | `WASHPOS_ENV`                | `development`           |
//! | `WASHPOS_DB_PATH`            | `./washpos_fiscal.db`   |
//! | `WASHPOS_DB_MAX_CONNECTIONS` | `5`                     |
//! | `WASHPOS_ENCRYPTION_KEY`     | none (required in prod) |
//! | `WASHPOS_KDF_ROUNDS`         | `100000`                |

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, warn};

use washpos_db::DbConfig;
use washpos_vault::{
    CredentialVault, MasterKey, VaultConfig, VaultError, DEFAULT_KDF_ROUNDS, ENCRYPTION_KEY_ENV,
    MIN_KDF_ROUNDS,
};

pub const ENV_VAR: &str = "WASHPOS_ENV";
pub const DB_PATH_VAR: &str = "WASHPOS_DB_PATH";
pub const DB_MAX_CONNECTIONS_VAR: &str = "WASHPOS_DB_MAX_CONNECTIONS";
pub const KDF_ROUNDS_VAR: &str = "WASHPOS_KDF_ROUNDS";

const DEFAULT_DB_PATH: &str = "./washpos_fiscal.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

/// Fiscal core configuration.
#[derive(Debug, Clone)]
pub struct FiscalConfig {
    pub environment: Environment,
    pub database_path: PathBuf,
    pub db_max_connections: u32,
    pub kdf_rounds: u32,
    /// Master key for the credential vault. Never logged.
    pub encryption_key: Option<SecretString>,
}

impl Default for FiscalConfig {
    fn default() -> Self {
        FiscalConfig {
            environment: Environment::Development,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            kdf_rounds: DEFAULT_KDF_ROUNDS,
            encryption_key: None,
        }
    }
}

impl FiscalConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's
    /// value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = FiscalConfig::default();

        if let Some(value) = get(ENV_VAR) {
            config.environment = value.parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_VAR,
                value: value.clone(),
            })?;
        }

        if let Some(path) = get(DB_PATH_VAR) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(value) = get(DB_MAX_CONNECTIONS_VAR) {
            config.db_max_connections = match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: DB_MAX_CONNECTIONS_VAR,
                        value,
                    })
                }
            };
        }

        if let Some(value) = get(KDF_ROUNDS_VAR) {
            config.kdf_rounds = match value.trim().parse::<u32>() {
                Ok(n) if n >= MIN_KDF_ROUNDS => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: KDF_ROUNDS_VAR,
                        value,
                    })
                }
            };
        }

        config.encryption_key = get(ENCRYPTION_KEY_ENV).map(SecretString::new);

        if config.environment.is_production() && config.encryption_key.is_none() {
            return Err(ConfigError::MissingRequired(ENCRYPTION_KEY_ENV));
        }

        info!(
            environment = config.environment.as_str(),
            database = %config.database_path.display(),
            max_connections = config.db_max_connections,
            kdf_rounds = config.kdf_rounds,
            encryption_key_set = config.encryption_key.is_some(),
            "Fiscal configuration loaded"
        );

        Ok(config)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.db_max_connections)
    }

    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig::default().kdf_rounds(self.kdf_rounds)
    }

    /// Resolves the master key. Production refuses the built-in default.
    pub fn master_key(&self) -> Result<MasterKey, ConfigError> {
        let key = MasterKey::resolve(
            self.encryption_key
                .as_ref()
                .map(|secret| secret.expose_secret().as_str()),
        )?;

        if self.environment.is_production() {
            return Ok(key.require_configured()?);
        }

        if key.is_insecure_default() {
            warn!(
                environment = self.environment.as_str(),
                "Credential vault running on the development key"
            );
        }
        Ok(key)
    }

    pub fn build_vault(&self) -> Result<CredentialVault, ConfigError> {
        Ok(CredentialVault::with_config(
            self.master_key()?,
            self.vault_config(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<FiscalConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FiscalConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.kdf_rounds, DEFAULT_KDF_ROUNDS);
        assert!(config.encryption_key.is_none());
    }

    #[test]
    fn test_production_requires_key() {
        let err = load(&[(ENV_VAR, "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(ENCRYPTION_KEY_ENV)));

        let config = load(&[(ENV_VAR, "prod"), (ENCRYPTION_KEY_ENV, KEY)]).unwrap();
        assert!(config.environment.is_production());
        assert!(!config.master_key().unwrap().is_insecure_default());
    }

    #[test]
    fn test_development_falls_back_to_default_key() {
        let config = load(&[(ENV_VAR, "dev")]).unwrap();
        assert!(config.master_key().unwrap().is_insecure_default());
    }

    #[test]
    fn test_short_key_rejected() {
        let config = load(&[(ENCRYPTION_KEY_ENV, "too-short")]).unwrap();
        assert!(matches!(
            config.master_key(),
            Err(ConfigError::Vault(VaultError::KeyTooShort { .. }))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[(ENV_VAR, "staging")]),
            Err(ConfigError::InvalidValue { var: ENV_VAR, .. })
        ));
        assert!(matches!(
            load(&[(KDF_ROUNDS_VAR, "10")]),
            Err(ConfigError::InvalidValue { var: KDF_ROUNDS_VAR, .. })
        ));
        assert!(matches!(
            load(&[(DB_MAX_CONNECTIONS_VAR, "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (DB_PATH_VAR, "/var/lib/washpos/fiscal.db"),
            (DB_MAX_CONNECTIONS_VAR, "8"),
            (KDF_ROUNDS_VAR, "20000"),
        ])
        .unwrap();
        assert_eq!(config.db_config().max_connections, 8);
        assert_eq!(config.vault_config(), VaultConfig::default().kdf_rounds(20_000));
    }
}
