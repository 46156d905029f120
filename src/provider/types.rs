use std::collections::HashMap;

use secrecy::SecretString;
use thiserror::Error;

use crate::config::ProviderSecretConfig;

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("Empty response from model")]
    EmptyResponse,
    #[error("Secret not found: {0}")]
    SecretNotFound(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// In-memory credentials for one provider. Values are wrapped so they never
/// show up in debug output or logs.
#[derive(Clone)]
pub struct ProviderSecret {
    pub api_key: SecretString,
    pub additional_auth: HashMap<String, SecretString>,
}

impl From<&ProviderSecretConfig> for ProviderSecret {
    fn from(config: &ProviderSecretConfig) -> Self {
        Self {
            api_key: SecretString::from(config.api_key.clone()),
            additional_auth: config
                .additional_auth
                .iter()
                .map(|(key, value)| (key.clone(), SecretString::from(value.clone())))
                .collect(),
        }
    }
}
