//! Schwab OAuth token refresh and the re-authorization retry policy.
//!
//! Market data requests carry a short-lived bearer access token. When the
//! API answers 401 the token is exchanged for a new one via the
//! [refresh-token grant](https://developer.schwab.com/user-guides/get-started/authenticate-with-oauth)
//! and the request is retried exactly once, see [`with_reauthorization`].

use std::future::Future;

use serde::Deserialize;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::{Result, TickercastError};

/// Tokens returned by a successful refresh-token grant.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchanges a refresh token for a new access token.
///
/// Authenticates with HTTP Basic `api_key:api_secret` and posts
/// `grant_type=refresh_token`.
///
/// # Errors
///
/// Returns [`TickercastError::AuthExpired`] if the token endpoint rejects
/// the request or its response cannot be parsed.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    api_key: &str,
    api_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .basic_auth(api_key, Some(api_secret))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .map_err(|e| TickercastError::AuthExpired(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Error refreshing access token");
        return Err(TickercastError::AuthExpired(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .map_err(|e| TickercastError::AuthExpired(format!("malformed token response: {e}")))?;

    info!(
        expires_in = tokens.expires_in,
        "Retrieved new access token using refresh token"
    );
    Ok(tokens)
}

/// Bearer and refresh tokens held by a provider client.
pub struct Tokens {
    pub access_token: Zeroizing<String>,
    pub refresh_token: Option<Zeroizing<String>>,
}

impl Tokens {
    /// Stores a freshly granted token pair. A missing refresh token in the
    /// response keeps the current one.
    pub fn update(&mut self, response: TokenResponse) {
        self.access_token = Zeroizing::new(response.access_token);
        if let Some(refresh) = response.refresh_token {
            self.refresh_token = Some(Zeroizing::new(refresh));
        }
    }
}

/// Runs `op`; if it fails with [`TickercastError::AuthExpired`], runs
/// `reauthorize` and then `op` exactly once more.
///
/// A failed refresh, or a second `AuthExpired`, is reported as
/// [`TickercastError::DataUnavailable`]. Any other error from `op` is
/// returned unchanged.
///
/// # Errors
///
/// Whatever `op` returns on its final attempt, with `AuthExpired` mapped as
/// described above.
pub async fn with_reauthorization<T, Op, OpFut, Re, ReFut>(
    mut op: Op,
    reauthorize: Re,
) -> Result<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Re: FnOnce() -> ReFut,
    ReFut: Future<Output = Result<()>>,
{
    match op().await {
        Err(TickercastError::AuthExpired(reason)) => {
            info!(%reason, "Access token rejected, reauthorizing");
            reauthorize().await.map_err(|e| {
                TickercastError::DataUnavailable(format!("reauthorization failed: {e}"))
            })?;

            match op().await {
                Err(TickercastError::AuthExpired(reason)) => Err(TickercastError::DataUnavailable(
                    format!("still unauthorized after reauthorizing: {reason}"),
                )),
                other => other,
            }
        }
        other => other,
    }
}
