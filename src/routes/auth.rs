use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use validator::Validate;

use crate::dto::auth_dto::{AuthUserSummary, LoginRequest, LoginResponse, RegisterRequest};
use crate::error::{Error, Result};
use crate::middleware::auth::{Claims, AUTH_COOKIE};
use crate::models::user::User;
use crate::utils::{password, token};
use crate::AppState;

fn auth_cookie(token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(time::Duration::hours(token::TOKEN_TTL_HOURS))
        .build()
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(CookieJar, Response)> {
    req.validate()?;

    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
    )
    .bind(&req.email)
    .fetch_one(&state.pool)
    .await?;
    if taken {
        return Err(Error::Conflict("Email already registered".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash, role)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(req.role)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("Registered {} {}", user.role, user.id);

    let token = token::create_token(user.id, user.role)?;
    let body = Json(LoginResponse {
        message: "Registration successful".to_string(),
        user: AuthUserSummary {
            name: user.name,
            email: user.email,
            role: user.role,
        },
    });
    Ok((
        jar.add(auth_cookie(token)),
        (StatusCode::CREATED, body).into_response(),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    req.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&req.email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| Error::Unauthorized("Invalid email or password".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(Error::Unauthorized("Invalid email or password".to_string()));
    }

    let token = token::create_token(user.id, user.role)?;
    Ok((
        jar.add(auth_cookie(token)),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user: AuthUserSummary {
                name: user.name,
                email: user.email,
                role: user.role,
            },
        }),
    ))
}

#[axum::debug_handler]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let mut removal = Cookie::from(AUTH_COOKIE);
    removal.set_path("/");
    (
        jar.remove(removal),
        Json(json!({ "message": "Logged out" })),
    )
}

/// Session probe for the frontend. Runs behind the auth middleware, so
/// reaching the handler means the cookie verified.
// No `debug_handler` here: the macro's generated helpers collide with a
// handler named `check` (E0428).
pub async fn check(Extension(claims): Extension<Claims>) -> Json<serde_json::Value> {
    Json(json!({ "valid": true, "role": claims.role }))
}
