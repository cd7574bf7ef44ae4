use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::tenancy::{Principal, TenantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: Uuid,
    pub name: String,
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(principal: &Principal) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: principal.id,
            name: principal.name.clone(),
            tenant_id: principal.tenant_id,
            is_admin: principal.is_admin,
            is_super_admin: principal.is_super_admin,
            exp,
            iat: now.timestamp(),
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal {
            id: claims.sub,
            name: claims.name,
            tenant_id: claims.tenant_id,
            is_admin: claims.is_admin || claims.is_super_admin,
            is_super_admin: claims.is_super_admin,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
    #[error("JWT secret not configured")]
    InvalidSecret,
}

fn secret() -> Result<&'static str, JwtError> {
    let secret = config::config().security.jwt_secret.as_str();
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret)
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret()?.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry, returning the claims
pub fn decode_jwt(token: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret()?.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Token for `principal`, as issued by the login flow
pub fn token_for(principal: &Principal) -> Result<String, JwtError> {
    generate_jwt(&Claims::new(principal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_principal() {
        let principal = Principal::admin(TenantId::new(), "gerente");
        let token = token_for(&principal).unwrap();
        let decoded: Principal = decode_jwt(&token).unwrap().into();
        assert_eq!(decoded, principal);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = token_for(&Principal::member(TenantId::new(), "ana")).unwrap();
        let err = decode_jwt(&format!("{}x", token)).unwrap_err();
        assert!(matches!(err, JwtError::InvalidToken(_)));
    }
}
