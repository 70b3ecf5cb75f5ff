//! Bearer-token acquisition via the OAuth2 client-credentials grant.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Failure to obtain a bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not get bearer token: {0}")]
    Request(#[from] reqwest::Error),

    #[error("could not get bearer token: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token response is missing access_token")]
    MissingToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchange API key/secret for a bearer token.
///
/// POSTs `grant_type=client_credentials` with HTTP basic auth to the token
/// endpoint. Called once per run, before pagination starts.
pub async fn get_bearer_token(
    client: &Client,
    token_url: &str,
    api_key: &str,
    api_secret: &str,
) -> Result<String, AuthError> {
    let response = client
        .post(token_url)
        .basic_auth(api_key, Some(api_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response.json().await?;
    token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}
