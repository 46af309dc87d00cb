//! Authorization token inspection.
//!
//! Tokens are `header.payload.signature`; the payload is base64url JSON
//! carrying the account's `public_key`. The signature is the server's
//! business and is never checked here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sawbuck_core::error::{MarketError, MarketResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    public_key: Option<String>,
}

/// Extracts the public key of the account a token was issued for.
pub fn public_key_from_token(token: &str) -> MarketResult<String> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|part| !part.is_empty())
        .ok_or_else(|| MarketError::Unauthorized("malformed authorization token".into()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| MarketError::Unauthorized(format!("token payload is not base64: {e}")))?;

    let claims: TokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| MarketError::Unauthorized(format!("token payload is not JSON: {e}")))?;

    claims
        .public_key
        .ok_or_else(|| MarketError::Unauthorized("token carries no public key".into()))
}
