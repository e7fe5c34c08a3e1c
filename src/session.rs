//! Signed session tokens carrying the caller's role.
//!
//! Tokens are issued by the identity layer and verified once per request, so
//! handlers never look the role up again. Format:
//! `hex(claims json) "." hex(HMAC-SHA256(key, claims json))`.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::models::users::Role;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: Role,
    /// Unix timestamp, seconds.
    pub expires_at: i64,
}

impl SessionClaims {
    /// Claims valid for `ttl` seconds from `now`.
    pub fn expiring(user_id: Uuid, role: Role, now: i64, ttl: i64) -> Result<Self, SessionError> {
        if ttl <= 0 {
            return Err(SessionError::Lifetime);
        }
        let expires_at = now.checked_add(ttl).ok_or(SessionError::Lifetime)?;

        Ok(SessionClaims {
            user_id,
            role,
            expires_at,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on anyone, users only on themselves.
    pub fn can_access(&self, user_id: Uuid) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Session key must not be empty.")]
    EmptyKey,
    #[error("Malformed session token.")]
    Malformed,
    #[error("Invalid session signature.")]
    BadSignature,
    #[error("Session expired.")]
    Expired,
    #[error("Session lifetime is out of range.")]
    Lifetime,
}

pub struct SessionSigner {
    mac: HmacSha256,
}

impl SessionSigner {
    pub fn new(key: &[u8]) -> Result<Self, SessionError> {
        if key.is_empty() {
            return Err(SessionError::EmptyKey);
        }

        let mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| SessionError::EmptyKey)?;

        Ok(SessionSigner { mac })
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        let payload = serde_json::to_vec(claims).map_err(|_| SessionError::Malformed)?;
        let signature = self.signed(&payload).finalize().into_bytes();

        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(signature)))
    }

    pub fn verify(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        let (payload, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let payload = hex::decode(payload).map_err(|_| SessionError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| SessionError::Malformed)?;

        self.signed(&payload)
            .verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;
        if claims.expires_at <= now {
            return Err(SessionError::Expired);
        }

        Ok(claims)
    }

    fn signed(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac
    }
}
