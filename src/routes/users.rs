/**
 * User Management Routes
 * Admin-only listing and maintenance of back-office accounts; editors can
 * manage content but never other accounts
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, DEFAULT_COST};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, models::User};
use crate::error::{map_unique_violation, ApiError};
use crate::routes::auth::{require_admin, ROLE_ADMIN, ROLE_EDITOR};

const USER_COLUMNS: &str = "id, email, password_hash, name, role, is_active, \
     last_login_at, login_attempts, created_at, updated_at";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, serde::Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn validate_role(role: &str) -> Result<(), ApiError> {
    if role == ROLE_ADMIN || role == ROLE_EDITOR {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid role '{}'. Must be 'admin' or 'editor'",
            role
        )))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/users - List all accounts (admin only).
/// Password hashes never serialize; the model skips the field.
pub async fn list_users(headers: HeaderMap) -> Result<Json<Vec<User>>, ApiError> {
    require_admin(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY created_at",
        USER_COLUMNS
    ))
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(users))
}

/// POST /api/admin/users - Create an editor or admin account (admin only).
/// Registration is closed after bootstrap; this is the only way in.
pub async fn create_user(
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers)?;

    if payload.email.is_empty() || !payload.email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    let role = payload.role.as_deref().unwrap_or(ROLE_EDITOR);
    validate_role(role)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    // bcrypt is CPU-bound; keep the async executor free.
    let password = payload.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("spawn_blocking panic during hash: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, password_hash, name, role, is_active)
        VALUES ($1, $2, $3, $4, true)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(&payload.name)
    .bind(role)
    .fetch_one(pool.as_ref())
    .await
    .map_err(|e| map_unique_violation(e, "Email already registered"))?;

    tracing::info!(role = %user.role, "User account created: {}", user.email);
    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /api/admin/users/{id} - Update name, role, or active flag (admin
/// only). An admin cannot demote or deactivate their own account, so the
/// system always retains at least one active admin.
pub async fn update_user(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let claims = require_admin(&headers)?;

    if let Some(role) = &payload.role {
        validate_role(role)?;
    }
    if claims.sub == id.to_string()
        && (payload.role.as_deref() == Some(ROLE_EDITOR) || payload.is_active == Some(false))
    {
        return Err(ApiError::Validation(
            "You cannot demote or deactivate your own account".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET name = $1, role = $2, is_active = $3, updated_at = now()
        WHERE id = $4
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(payload.name.or(existing.name))
    .bind(payload.role.unwrap_or(existing.role))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    // A disabled account must not keep working sessions alive.
    if !user.is_active {
        let _ = sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
            .bind(id)
            .execute(pool.as_ref())
            .await;
    }

    tracing::info!(role = %user.role, active = user.is_active, "User account updated: {}", user.email);
    Ok(Json(user))
}

/// DELETE /api/admin/users/{id} (admin only; refresh tokens cascade)
pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let claims = require_admin(&headers)?;

    if claims.sub == id.to_string() {
        return Err(ApiError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::create_access_token;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_validate_role() {
        assert!(validate_role("admin").is_ok());
        assert!(validate_role("editor").is_ok());
        assert!(validate_role("superuser").is_err());
    }

    #[tokio::test]
    async fn test_list_users_requires_token() {
        let result = list_users(HeaderMap::new()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_editor_cannot_manage_users() {
        let token = create_access_token("user-2", "editor@pioduran.gov.ph", "editor").unwrap();
        let result = list_users(bearer(&token)).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let payload = CreateUserRequest {
            email: "new@pioduran.gov.ph".to_string(),
            password: "longenough".to_string(),
            name: None,
            role: None,
        };
        let result = create_user(bearer(&token), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_deactivate_own_account() {
        let id = Uuid::new_v4();
        let token = create_access_token(&id.to_string(), "drrmo@pioduran.gov.ph", "admin").unwrap();
        let payload = UpdateUserRequest {
            name: None,
            role: None,
            is_active: Some(false),
        };
        let result = update_user(bearer(&token), Path(id), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_own_account() {
        let id = Uuid::new_v4();
        let token = create_access_token(&id.to_string(), "drrmo@pioduran.gov.ph", "admin").unwrap();
        let payload = UpdateUserRequest {
            name: None,
            role: Some("editor".to_string()),
            is_active: None,
        };
        let result = update_user(bearer(&token), Path(id), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_own_account() {
        let id = Uuid::new_v4();
        let token = create_access_token(&id.to_string(), "drrmo@pioduran.gov.ph", "admin").unwrap();
        let result = delete_user(bearer(&token), Path(id)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_user_validates_role_and_password() {
        let token = create_access_token("user-1", "drrmo@pioduran.gov.ph", "admin").unwrap();

        let payload = CreateUserRequest {
            email: "new@pioduran.gov.ph".to_string(),
            password: "short".to_string(),
            name: None,
            role: None,
        };
        let result = create_user(bearer(&token), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        let payload = CreateUserRequest {
            email: "new@pioduran.gov.ph".to_string(),
            password: "longenough".to_string(),
            name: None,
            role: Some("superuser".to_string()),
        };
        let result = create_user(bearer(&token), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
