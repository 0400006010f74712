use crate::config::get_config;
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::user::UserRole;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

pub const TOKEN_TTL_HOURS: i64 = 24;

/// Issues the signed credential carried by the `token` cookie.
pub fn create_token(user_id: Uuid, role: UserRole) -> Result<String> {
    let config = get_config();
    let exp = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id,
        role,
        exp: exp.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
}
