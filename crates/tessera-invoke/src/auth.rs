//! Auth strategy resolution.
//!
//! Each `AuthConfig` variant maps to the headers added to an outbound call:
//!
//! - `None`   → nothing
//! - `Hmac`   → `x-hmac-signature: <hex HMAC-SHA256 of the exact body bytes>`
//! - `Bearer` → `authorization: Bearer <HS256 JWT, sub = agent id>`
//!
//! Secret resolution failures surface as `TesseraError::Auth` and are never
//! retried.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use tessera_contracts::{
    agent::{Agent, AuthConfig},
    error::{TesseraError, TesseraResult},
};
use tessera_core::traits::SecretResolver;

use crate::config::ClientConfig;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hmac-signature";
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Claims carried by bearer tokens minted for agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTokenClaims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_hmac(secret: &[u8], body: &[u8]) -> TesseraResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TesseraError::Auth {
        reason: format!("invalid signing secret: {e}"),
    })?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Mint an HS256 token for `subject`, valid for `ttl` from `now`.
pub fn mint_bearer_token(
    secret: &[u8],
    subject: &str,
    issuer: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> TesseraResult<String> {
    let expiry = now.checked_add_signed(ttl).ok_or_else(|| TesseraError::Auth {
        reason: format!("token lifetime of {}s overflows the clock", ttl.num_seconds()),
    })?;
    let claims = AgentTokenClaims {
        sub: subject.to_string(),
        iss: issuer.to_string(),
        iat: now.timestamp(),
        exp: expiry.timestamp(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TesseraError::Auth {
        reason: format!("failed to sign bearer token: {e}"),
    })
}

/// Produces auth headers for an agent from its `AuthConfig`.
pub struct AuthResolver {
    secrets: Arc<dyn SecretResolver>,
    service_secret_ref: String,
    issuer: String,
    token_ttl: Option<Duration>,
    token_ttl_secs: i64,
}

impl AuthResolver {
    pub fn new(secrets: Arc<dyn SecretResolver>, config: &ClientConfig) -> Self {
        Self {
            secrets,
            service_secret_ref: config.service_secret_ref.clone(),
            issuer: config.token_issuer.clone(),
            token_ttl: config.token_ttl().ok(),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    /// Headers authenticating `body` (the exact bytes that will be sent) to
    /// `agent`.
    pub async fn headers(
        &self,
        agent: &Agent,
        body: &[u8],
    ) -> TesseraResult<Vec<(String, String)>> {
        match &agent.auth {
            AuthConfig::None => Ok(Vec::new()),
            AuthConfig::Hmac { secret_ref } => {
                let secret = self.secrets.get_secret(secret_ref).await?;
                let signature = sign_hmac(secret.as_bytes(), body)?;
                debug!(agent_id = %agent.id, "signed request body");
                Ok(vec![(SIGNATURE_HEADER.to_string(), signature)])
            }
            AuthConfig::Bearer => {
                let ttl = self.token_ttl.ok_or_else(|| TesseraError::Config {
                    reason: format!("token_ttl_secs {} is out of range", self.token_ttl_secs),
                })?;
                let secret = self.secrets.get_secret(&self.service_secret_ref).await?;
                let token = mint_bearer_token(
                    secret.as_bytes(),
                    agent.id.as_str(),
                    &self.issuer,
                    ttl,
                    Utc::now(),
                )?;
                debug!(agent_id = %agent.id, "minted bearer token");
                Ok(vec![(AUTHORIZATION_HEADER.to_string(), format!("Bearer {token}"))])
            }
        }
    }
}
