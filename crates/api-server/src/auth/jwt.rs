//! JWT issuance and verification
//!
//! Access and refresh tokens carry a `type` claim; a token issued as one
//! type never verifies as the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::Error;

const ACCESS_TTL_MINUTES: i64 = 15;
const REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    fn ttl(self) -> Duration {
        match self {
            Self::Access => Duration::minutes(ACCESS_TTL_MINUTES),
            Self::Refresh => Duration::days(REFRESH_TTL_DAYS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    #[serde(rename = "type")]
    token_type: String,
}

fn jwt_secret() -> String {
    std::env::var("CRM_JWT_SECRET").unwrap_or_else(|_| "dev-jwt-secret-change-me".to_string())
}

pub fn issue_token(user_id: Uuid, token_type: TokenType) -> Result<(String, usize), Error> {
    let exp = (Utc::now() + token_type.ttl()).timestamp();
    let exp = usize::try_from(exp)
        .map_err(|_| Error::Storage("Failed to encode token expiration".to_string()))?;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
        token_type: token_type.as_str().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
    .map(|token| (token, exp))
    .map_err(|err| Error::Storage(format!("Failed to sign JWT: {}", err)))
}

pub fn verify_token(token: &str, expected: TokenType) -> Result<Uuid, Error> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|err| Error::Authentication(format!("Invalid token: {}", err)))?;

    if decoded.claims.token_type != expected.as_str() {
        return Err(Error::Authentication("Invalid token type".to_string()));
    }
    Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| Error::Authentication("Invalid token subject".to_string()))
}
