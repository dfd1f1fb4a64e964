//! External identity provider client (Google OAuth code flow).
//!
//! The handlers in `api::handlers::login` drive the redirect dance; this
//! module owns the protocol pieces: the state nonce, the authorization URL,
//! the code-for-token exchange and the userinfo fetch.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use serde::Deserialize;
use url::Url;

use crate::{config::GoogleAuthConfig, errors::Error};

/// Cookie holding the state nonce between the redirect and the callback.
pub const STATE_COOKIE: &str = "clinica_oauth_state";

/// Generate a random state nonce for CSRF protection of the redirect dance.
pub fn generate_state_nonce() -> String {
    // 32 bytes (256 bits) of cryptographically secure random data
    let mut nonce_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut nonce_bytes);

    // Encode as base64url without padding
    general_purpose::URL_SAFE_NO_PAD.encode(nonce_bytes)
}

/// Short-lived cookie carrying the state nonce to the callback.
pub fn state_cookie(value: &str) -> String {
    format!("{STATE_COOKIE}={value}; Path=/login; HttpOnly; SameSite=Lax; Max-Age=600")
}

/// Clears the state cookie once the callback has consumed it.
pub fn clear_state_cookie() -> String {
    format!("{STATE_COOKIE}=; Path=/login; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Build the provider's authorization URL for the initial redirect.
pub fn build_authorize_url(config: &GoogleAuthConfig, state: &str) -> Url {
    let mut url = config.authorize_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_url)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid email profile")
        .append_pair("state", state);
    url
}

/// Token endpoint response. Only the access token is used; the id token is
/// accepted but userinfo is fetched explicitly instead of decoding it.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Subset of the OpenID Connect userinfo claims this system consumes.
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    /// Stable identifier for the external identity
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Exchange the authorization code for tokens.
pub async fn exchange_code(config: &GoogleAuthConfig, code: &str) -> Result<TokenResponse, Error> {
    let client = reqwest::Client::new();
    let response = client
        .post(config.token_endpoint.clone())
        .form(&[
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| Error::Internal {
            operation: format!("reach identity provider token endpoint: {e}"),
        })?;

    if !response.status().is_success() {
        // The provider rejected the code; the caller's login attempt failed
        return Err(Error::Unauthenticated {
            message: Some("External login was not accepted by the identity provider".to_string()),
        });
    }

    response.json::<TokenResponse>().await.map_err(|e| Error::Internal {
        operation: format!("decode identity provider token response: {e}"),
    })
}

/// Fetch the verified identity behind an access token.
pub async fn fetch_userinfo(config: &GoogleAuthConfig, access_token: &str) -> Result<UserInfo, Error> {
    let client = reqwest::Client::new();
    let response = client
        .get(config.userinfo_endpoint.clone())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Internal {
            operation: format!("reach identity provider userinfo endpoint: {e}"),
        })?;

    if !response.status().is_success() {
        return Err(Error::Unauthenticated {
            message: Some("External identity could not be verified".to_string()),
        });
    }

    response.json::<UserInfo>().await.map_err(|e| Error::Internal {
        operation: format!("decode identity provider userinfo response: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_nonce_is_random_base64url() {
        let nonce1 = generate_state_nonce();
        let nonce2 = generate_state_nonce();

        assert_ne!(nonce1, nonce2);
        // 32 bytes -> 43 chars of unpadded base64url
        assert_eq!(nonce1.len(), 43);
        assert!(nonce1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!nonce1.contains('='));
    }

    #[test]
    fn test_authorize_url_carries_client_and_state() {
        let config = GoogleAuthConfig {
            client_id: "client-123".to_string(),
            redirect_url: "https://clinic.example.com/login/google-response".to_string(),
            ..Default::default()
        };

        let url = build_authorize_url(&config, "nonce-abc");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(query.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(query.contains(&("state".to_string(), "nonce-abc".to_string())));
        assert!(query.contains(&("response_type".to_string(), "code".to_string())));
        assert!(
            query.contains(&(
                "redirect_uri".to_string(),
                "https://clinic.example.com/login/google-response".to_string()
            ))
        );
    }
}
