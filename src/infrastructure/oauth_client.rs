use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::domain::models::Credential;
use crate::infrastructure::error::CoreError;

#[derive(Debug, Clone)]
pub struct OAuthCodeExchangeRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_code: String,
}

#[derive(Debug, Clone)]
pub struct OAuthRefreshRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl OAuthTokenResponse {
    /// Normalizes a token-endpoint response into a credential. Refresh
    /// grants do not echo the refresh token back, so the caller supplies
    /// the one it already holds as a fallback.
    pub fn into_credential(
        self,
        now: DateTime<Utc>,
        fallback_refresh_token: Option<String>,
    ) -> Credential {
        let expires_at = self
            .expires_in
            .filter(|seconds| *seconds > 0)
            .map(|seconds| now + chrono::Duration::seconds(seconds));

        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: self.scope,
        }
    }
}

/// Transport seam for the OAuth token endpoint. Production posts form
/// bodies over reqwest; tests script responses.
#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, CoreError>;

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, CoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct GoogleTokenResponsePayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ReqwestOAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<OAuthTokenResponse, CoreError> {
        let response = self
            .client
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|error| CoreError::Auth(format!("token request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| CoreError::Auth(format!("failed reading token response: {error}")))?;

        let parsed = serde_json::from_str::<GoogleTokenResponsePayload>(&body).map_err(|error| {
            CoreError::Auth(format!("invalid token response payload: {error}; body={body}"))
        })?;

        if !status.is_success() || parsed.error.is_some() {
            let code = parsed
                .error
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let detail = parsed.error_description.unwrap_or_else(|| body.clone());
            return Err(CoreError::Auth(format!(
                "token endpoint error: {code}; {detail}"
            )));
        }

        let access_token = parsed
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                CoreError::Auth("token response did not include access_token".to_string())
            })?;

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in,
            token_type: parsed.token_type,
            scope: parsed.scope,
        })
    }
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, CoreError> {
        self.post_form(
            &request.token_endpoint,
            &[
                ("grant_type", "authorization_code".to_string()),
                ("client_id", request.client_id),
                ("client_secret", request.client_secret),
                ("redirect_uri", request.redirect_uri),
                ("code", request.authorization_code),
            ],
        )
        .await
    }

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, CoreError> {
        self.post_form(
            &request.token_endpoint,
            &[
                ("grant_type", "refresh_token".to_string()),
                ("client_id", request.client_id),
                ("client_secret", request.client_secret),
                ("refresh_token", request.refresh_token),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T00:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn credential_expiry_is_now_plus_expires_in() {
        let response = OAuthTokenResponse {
            access_token: "at-1".to_string(),
            refresh_token: Some("rt-1".to_string()),
            expires_in: Some(3600),
            token_type: Some("Bearer".to_string()),
            scope: None,
        };

        let credential = response.into_credential(fixed_now(), None);
        assert_eq!(
            credential.expires_at,
            Some(fixed_now() + chrono::Duration::seconds(3600))
        );
        assert_eq!(credential.refresh_token.as_deref(), Some("rt-1"));
    }

    #[test]
    fn refresh_grant_keeps_the_existing_refresh_token() {
        let response = OAuthTokenResponse {
            access_token: "at-2".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            token_type: None,
            scope: None,
        };

        let credential = response.into_credential(fixed_now(), Some("rt-stored".to_string()));
        assert_eq!(credential.refresh_token.as_deref(), Some("rt-stored"));
        assert_eq!(credential.token_type, "Bearer");
    }

    #[test]
    fn missing_or_non_positive_expiry_yields_no_expiry() {
        let response = OAuthTokenResponse {
            access_token: "at-3".to_string(),
            refresh_token: None,
            expires_in: Some(0),
            token_type: None,
            scope: None,
        };
        assert!(
            response
                .into_credential(fixed_now(), None)
                .expires_at
                .is_none()
        );
    }
}
