use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::user::UserRole;

pub const AUTH_COOKIE: &str = "token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: usize,
}

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

fn authenticate(req: &Request) -> Result<Claims, Response> {
    let jar = CookieJar::from_headers(req.headers());
    let Some(cookie) = jar.get(AUTH_COOKIE) else {
        return Err(unauthorized("missing_token"));
    };

    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        cookie.value(),
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| unauthorized("invalid_token"))
}

/// Verifies the token cookie and attaches the decoded claims to the request.
pub async fn require_auth(mut req: Request, next: Next) -> Response {
    match authenticate(&req) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

pub async fn require_student(req: Request, next: Next) -> Response {
    require_role(req, next, UserRole::Student).await
}

pub async fn require_teacher(req: Request, next: Next) -> Response {
    require_role(req, next, UserRole::Teacher).await
}

async fn require_role(mut req: Request, next: Next, role: UserRole) -> Response {
    match authenticate(&req) {
        Ok(claims) => {
            if claims.role != role {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "Access denied: incorrect role" })),
                )
                    .into_response();
            }
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}
