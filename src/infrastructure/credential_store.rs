use std::sync::Mutex;

use crate::domain::models::Credential;
use crate::infrastructure::error::CoreError;

pub trait CredentialStore: Send + Sync {
    fn save_credential(&self, credential: &Credential) -> Result<(), CoreError>;
    fn load_credential(&self) -> Result<Option<Credential>, CoreError>;
    fn delete_credential(&self) -> Result<(), CoreError>;
}

/// Stores the credential as a JSON payload in the OS keychain, one entry
/// per (service, account) pair.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, CoreError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| CoreError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("studysync.oauth.google", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_credential(&self, credential: &Credential) -> Result<(), CoreError> {
        let payload = serde_json::to_string(credential)
            .map_err(|error| CoreError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| CoreError::Credential(error.to_string()))
    }

    fn load_credential(&self) -> Result<Option<Credential>, CoreError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(CoreError::Credential(error.to_string())),
        };

        let credential = serde_json::from_str::<Credential>(&payload)
            .map_err(|error| CoreError::Credential(error.to_string()))?;
        Ok(Some(credential))
    }

    fn delete_credential(&self) -> Result<(), CoreError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CoreError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_credential(&self, credential: &Credential) -> Result<(), CoreError> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|error| CoreError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(credential.clone());
        Ok(())
    }

    fn load_credential(&self) -> Result<Option<Credential>, CoreError> {
        let guard = self
            .credential
            .lock()
            .map_err(|error| CoreError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_credential(&self) -> Result<(), CoreError> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|error| CoreError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
