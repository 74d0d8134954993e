/**
 * Authentication Routes
 * JWT-based authentication with register, login, verify, refresh, and logout
 */
use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db;
use crate::error::{map_unique_violation, ApiError};

// ============================================================================
// Configuration
// ============================================================================

lazy_static::lazy_static! {
    /// JWT secret key from environment
    pub static ref JWT_SECRET: String = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "default-jwt-secret-change-in-production".to_string());

    /// Rate limit storage (IP -> last request timestamp)
    static ref RATE_LIMIT: Arc<RwLock<HashMap<String, i64>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Access token expiry in minutes
const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Refresh token expiry in days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Rate limit window in seconds (1 login request per IP per window)
#[allow(dead_code)]
const RATE_LIMIT_WINDOW_SECS: i64 = 60;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // "admin" or "editor"
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

/// User info returned to the admin frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub success: bool,
    pub user: UserInfo,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn generate_refresh_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// SHA-256 of the refresh token; only the hash is stored so a leaked table
/// cannot be replayed.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn create_access_token(
    user_id: &str,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
}

/// Verify and decode access token
pub fn verify_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Claims from the Authorization header, if a valid token is present.
/// Public read paths use this for draft visibility.
pub fn maybe_claims(headers: &HeaderMap) -> Option<Claims> {
    extract_bearer_token(headers).and_then(|t| verify_access_token(&t).ok())
}

/// Require a valid token from any back-office role (admin or editor).
pub fn require_auth(headers: &HeaderMap) -> Result<Claims, ApiError> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Authorization required".to_string()))?;
    verify_access_token(&token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
}

/// Require the admin role; editors can manage content but not users.
pub fn require_admin(headers: &HeaderMap) -> Result<Claims, ApiError> {
    let claims = require_auth(headers)?;
    if claims.role != ROLE_ADMIN {
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }
    Ok(claims)
}

/// Check rate limit for an IP.
///
/// Also removes stale entries from the map on every write so the HashMap
/// does not grow without bound as unique IPs accumulate over time.
async fn check_rate_limit(ip: &str) -> bool {
    #[cfg(test)]
    {
        let _ = ip;
        return true; // Bypass in tests so validation and credentials are exercised
    }

    #[cfg(not(test))]
    {
        let now = Utc::now().timestamp();
        let mut limits = RATE_LIMIT.write().await;

        limits.retain(|_, last| now - *last < RATE_LIMIT_WINDOW_SECS);

        if let Some(last_request) = limits.get(ip) {
            if now - last_request < RATE_LIMIT_WINDOW_SECS {
                return false;
            }
        }

        limits.insert(ip.to_string(), now);
        true
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    Ok(())
}

async fn store_refresh_token(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    token: &str,
) -> Result<(), ApiError> {
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(hash_refresh_token(token))
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
/// Register the first admin user (only works while no user exists)
pub async fn register(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = addr.ip().to_string();
    if !check_rate_limit(&ip).await {
        return Err(ApiError::Validation(
            "Too many requests. Please try again later.".to_string(),
        ));
    }

    validate_credentials(&payload.email, &payload.password)?;
    if payload.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool.as_ref())
        .await?;
    if existing.0 > 0 {
        return Err(ApiError::Forbidden(
            "Registration is closed. An admin account already exists.".to_string(),
        ));
    }

    // bcrypt is CPU-bound; keep the async executor free.
    let password = payload.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("spawn_blocking panic during hash: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))?;

    let user_id: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, password_hash, name, role, is_active)
        VALUES ($1, $2, $3, 'admin', true)
        RETURNING id
        "#,
    )
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(&payload.name)
    .fetch_one(pool.as_ref())
    .await
    .map_err(|e| map_unique_violation(e, "Email already registered"))?;

    tracing::info!("Admin user registered: {}", payload.email);

    Ok((
        StatusCode::CREATED,
        Json(UserInfo {
            user_id: user_id.0.to_string(),
            email: payload.email,
            role: ROLE_ADMIN.to_string(),
        }),
    ))
}

/// POST /api/auth/login
/// Authenticate user and return tokens
pub async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let ip = addr.ip().to_string();
    if !check_rate_limit(&ip).await {
        return Err(ApiError::Validation(
            "Too many requests. Please try again later.".to_string(),
        ));
    }

    validate_credentials(&payload.email, &payload.password)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let row: Option<(Uuid, String, String, String, bool)> = sqlx::query_as(
        r#"
        SELECT id, email, password_hash, role, is_active
        FROM users
        WHERE LOWER(email) = LOWER($1)
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(pool.as_ref())
    .await?;

    let Some((id, email, password_hash, role, is_active)) = row else {
        tracing::warn!("Login attempt for unknown user: {}", payload.email);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    };

    if !is_active {
        return Err(ApiError::Forbidden("Account is disabled.".to_string()));
    }

    let password = payload.password.clone();
    let password_ok =
        tokio::task::spawn_blocking(move || verify(&password, &password_hash).unwrap_or(false))
            .await
            .unwrap_or(false);

    if !password_ok {
        let _ = sqlx::query(
            "UPDATE users SET login_attempts = login_attempts + 1, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(pool.as_ref())
        .await;
        tracing::warn!("Failed login attempt for: {}", email);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let _ = sqlx::query(
        "UPDATE users SET last_login_at = now(), login_attempts = 0, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool.as_ref())
    .await;

    let access_token = create_access_token(&id.to_string(), &email, &role)
        .map_err(|e| ApiError::Internal(format!("failed to sign access token: {}", e)))?;
    let refresh_token = generate_refresh_token();
    store_refresh_token(pool.as_ref(), id, &refresh_token).await?;

    tracing::info!("User logged in: {}", email);

    Ok(Json(TokenResponse {
        success: true,
        user: UserInfo {
            user_id: id.to_string(),
            email,
            role,
        },
        access_token,
        refresh_token,
    }))
}

/// POST /api/auth/verify
/// Validate the presented access token
pub async fn verify_token(headers: HeaderMap) -> Json<VerifyResponse> {
    match extract_bearer_token(&headers).and_then(|t| verify_access_token(&t).ok()) {
        Some(claims) => Json(VerifyResponse {
            success: true,
            is_valid: true,
            user: Some(UserInfo {
                user_id: claims.sub,
                email: claims.email,
                role: claims.role,
            }),
        }),
        None => Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
        }),
    }
}

/// POST /api/auth/refresh
/// Rotate the refresh token and issue a new access token
pub async fn refresh(
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let token_hash = hash_refresh_token(&payload.refresh_token);
    let row: Option<(Uuid, Uuid, DateTime<Utc>, bool)> = sqlx::query_as(
        r#"
        SELECT id, user_id, expires_at, revoked
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(pool.as_ref())
    .await?;

    let Some((token_id, user_id, expires_at, revoked)) = row else {
        return Err(ApiError::Unauthorized("Invalid refresh token".to_string()));
    };
    if revoked || expires_at < Utc::now() {
        return Err(ApiError::Unauthorized(
            "Refresh token expired or revoked".to_string(),
        ));
    }

    let user: Option<(String, String, bool)> =
        sqlx::query_as("SELECT email, role, is_active FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool.as_ref())
            .await?;
    let Some((email, role, is_active)) = user else {
        return Err(ApiError::Unauthorized("Invalid refresh token".to_string()));
    };
    if !is_active {
        return Err(ApiError::Forbidden("Account is disabled.".to_string()));
    }

    // Rotation: revoke the presented token before issuing a replacement.
    sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE id = $1")
        .bind(token_id)
        .execute(pool.as_ref())
        .await?;

    let access_token = create_access_token(&user_id.to_string(), &email, &role)
        .map_err(|e| ApiError::Internal(format!("failed to sign access token: {}", e)))?;
    let new_refresh = generate_refresh_token();
    store_refresh_token(pool.as_ref(), user_id, &new_refresh).await?;

    Ok(Json(TokenResponse {
        success: true,
        user: UserInfo {
            user_id: user_id.to_string(),
            email,
            role,
        },
        access_token,
        refresh_token: new_refresh,
    }))
}

/// POST /api/auth/logout
/// Revoke the presented refresh token
pub async fn logout(Json(payload): Json<LogoutRequest>) -> Result<Json<SuccessResponse>, ApiError> {
    if let (Some(refresh_token), Some(pool)) = (payload.refresh_token, db::get_pool()) {
        let _ = sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE token_hash = $1")
            .bind(hash_refresh_token(&refresh_token))
            .execute(pool.as_ref())
            .await;
    }
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_roundtrip() {
        let token = create_access_token("user-1", "drrmo@pioduran.gov.ph", "admin").unwrap();
        let claims = verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "drrmo@pioduran.gov.ph");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_access_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_refresh_token_hash_is_stable_and_hex() {
        let token = "abc123";
        let h1 = hash_refresh_token(token);
        let h2 = hash_refresh_token(token);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h1, hash_refresh_token("abc124"));
    }

    #[test]
    fn test_generated_refresh_tokens_differ() {
        assert_ne!(generate_refresh_token(), generate_refresh_token());
        assert_eq!(generate_refresh_token().len(), 64);
    }

    #[test]
    fn test_require_auth_without_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            require_auth(&headers),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_require_admin_rejects_editor() {
        let token = create_access_token("user-2", "editor@pioduran.gov.ph", "editor").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        assert!(require_auth(&headers).is_ok());
        assert!(matches!(
            require_admin(&headers),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_maybe_claims_none_for_bad_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer junk".parse().unwrap());
        assert!(maybe_claims(&headers).is_none());
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("", "pw").is_err());
        assert!(validate_credentials("no-at-sign", "pw").is_err());
        assert!(validate_credentials("a@b.c", "pw").is_ok());
    }
}
