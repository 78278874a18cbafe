use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::domain::models::Credential;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::CoreError;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest,
};

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/oauth2/callback";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

// Tokens within this many seconds of expiry are refreshed eagerly.
const EXPIRY_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthSettings {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = required_lookup_value(
            &lookup,
            &["STUDYSYNC_GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_ID"],
            "google client id",
        )?;
        let client_secret = required_lookup_value(
            &lookup,
            &["STUDYSYNC_GOOGLE_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"],
            "google client secret",
        )?;
        let redirect_uri = optional_lookup_value(
            &lookup,
            &["STUDYSYNC_GOOGLE_REDIRECT_URI", "GOOGLE_REDIRECT_URI"],
        )
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        let scopes = optional_lookup_value(&lookup, &["STUDYSYNC_GOOGLE_SCOPES", "GOOGLE_SCOPES"])
            .map(|raw| parse_scope_list(&raw))
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]);

        Ok(Self::new(client_id, client_secret, redirect_uri, scopes))
    }
}

fn required_lookup_value<F>(lookup: &F, keys: &[&str], field_name: &str) -> Result<String, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        CoreError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Outcome of asking the broker for a usable credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid(Credential),
    Refreshed(Credential),
    InteractionRequired,
}

impl CredentialStatus {
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            CredentialStatus::Valid(credential) | CredentialStatus::Refreshed(credential) => {
                Some(credential)
            }
            CredentialStatus::InteractionRequired => None,
        }
    }
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Acquires, refreshes, and stores the calendar credential. The session
/// treats this as an opaque capability-returning collaborator: every path
/// either yields a `Credential` or says the user must re-authorize.
pub struct CredentialBroker<S, O>
where
    S: CredentialStore,
    O: OAuthHttpClient,
{
    settings: OAuthSettings,
    credential_store: Arc<S>,
    oauth_client: Arc<O>,
    now_provider: NowProvider,
}

impl<S, O> CredentialBroker<S, O>
where
    S: CredentialStore,
    O: OAuthHttpClient,
{
    pub fn new(settings: OAuthSettings, credential_store: Arc<S>, oauth_client: Arc<O>) -> Self {
        Self {
            settings,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_credential_valid(&self, credential: &Credential) -> bool {
        credential.is_valid_at((self.now_provider)(), EXPIRY_LEEWAY_SECONDS)
    }

    pub fn build_authorization_url(&self, state: &str) -> Result<String, CoreError> {
        if state.trim().is_empty() {
            return Err(CoreError::Auth("state must not be empty".to_string()));
        }
        if self.settings.scopes.is_empty() {
            return Err(CoreError::Auth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.settings.authorization_endpoint)
            .map_err(|error| CoreError::Auth(format!("invalid authorization endpoint: {error}")))?;
        let scope = self.settings.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    pub async fn authenticate_with_code(
        &self,
        authorization_code: &str,
    ) -> Result<Credential, CoreError> {
        if authorization_code.trim().is_empty() {
            return Err(CoreError::Auth(
                "authorization code must not be empty".to_string(),
            ));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: self.settings.token_endpoint.clone(),
                client_id: self.settings.client_id.clone(),
                client_secret: self.settings.client_secret.clone(),
                redirect_uri: self.settings.redirect_uri.clone(),
                authorization_code: authorization_code.to_string(),
            })
            .await?;

        let credential = response.into_credential((self.now_provider)(), None);
        self.credential_store.save_credential(&credential)?;
        Ok(credential)
    }

    /// Server-side bootstrap path: a long-lived refresh token stands in for
    /// the browser flow. The refreshed credential keeps the supplied
    /// refresh token for subsequent renewals.
    pub async fn authenticate_with_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Credential, CoreError> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(CoreError::Auth("refresh token must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.settings.token_endpoint.clone(),
                client_id: self.settings.client_id.clone(),
                client_secret: self.settings.client_secret.clone(),
                refresh_token: refresh_token.to_string(),
            })
            .await?;

        let credential =
            response.into_credential((self.now_provider)(), Some(refresh_token.to_string()));
        self.credential_store.save_credential(&credential)?;
        Ok(credential)
    }

    /// Returns the stored credential, refreshing it when expired. A failed
    /// refresh is not fatal: it means the user has to go through the
    /// authorization flow again.
    pub async fn ensure_credential(&self) -> Result<CredentialStatus, CoreError> {
        let Some(stored) = self.credential_store.load_credential()? else {
            return Ok(CredentialStatus::InteractionRequired);
        };

        if self.is_credential_valid(&stored) {
            return Ok(CredentialStatus::Valid(stored));
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            return Ok(CredentialStatus::InteractionRequired);
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.settings.token_endpoint.clone(),
                client_id: self.settings.client_id.clone(),
                client_secret: self.settings.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let credential =
                    response.into_credential((self.now_provider)(), stored.refresh_token);
                self.credential_store.save_credential(&credential)?;
                Ok(CredentialStatus::Refreshed(credential))
            }
            Err(CoreError::Auth(_)) => Ok(CredentialStatus::InteractionRequired),
            Err(error) => Err(error),
        }
    }

    pub fn clear_credential(&self) -> Result<(), CoreError> {
        self.credential_store.delete_credential()
    }
}
