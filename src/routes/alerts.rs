/**
 * Emergency Alert Routes
 * Transient broadcast entities shown in the public rotating banner
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, models::EmergencyAlert};
use crate::error::ApiError;
use crate::routes::auth::require_auth;

const ALERT_COLUMNS: &str = "id, alert_type, severity, title, message, location, issued_at, \
     is_public, is_active, created_at, updated_at";

const ALERT_TYPES: &[&str] = &[
    "typhoon",
    "flood",
    "earthquake",
    "fire",
    "landslide",
    "tsunami",
    "general",
];
const SEVERITIES: &[&str] = &["advisory", "watch", "warning", "critical"];

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub title: String,
    pub message: String,
    pub location: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub location: Option<String>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn validate_alert_type(alert_type: &str) -> Result<(), ApiError> {
    if ALERT_TYPES.contains(&alert_type) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid alert type '{}'. Valid types: {:?}",
            alert_type, ALERT_TYPES
        )))
    }
}

fn validate_severity(severity: &str) -> Result<(), ApiError> {
    if SEVERITIES.contains(&severity) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid severity '{}'. Valid severities: {:?}",
            severity, SEVERITIES
        )))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/alerts - Active public alerts for the banner, newest first
pub async fn list_public_alerts() -> Result<Json<Vec<EmergencyAlert>>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let alerts = sqlx::query_as::<_, EmergencyAlert>(&format!(
        r#"
        SELECT {} FROM emergency_alerts
        WHERE is_active = true AND is_public = true
        ORDER BY issued_at DESC
        "#,
        ALERT_COLUMNS
    ))
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(alerts))
}

/// GET /api/admin/alerts - All alerts including retired ones (auth required)
pub async fn list_all_alerts(headers: HeaderMap) -> Result<Json<Vec<EmergencyAlert>>, ApiError> {
    require_auth(&headers)?;
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let alerts = sqlx::query_as::<_, EmergencyAlert>(&format!(
        "SELECT {} FROM emergency_alerts ORDER BY issued_at DESC",
        ALERT_COLUMNS
    ))
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(alerts))
}

/// POST /api/admin/alerts - Issue an alert (auth required)
pub async fn create_alert(
    headers: HeaderMap,
    Json(payload): Json<CreateAlertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if payload.title.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(ApiError::Validation(
            "Title and message are required".to_string(),
        ));
    }
    let alert_type = payload.alert_type.as_deref().unwrap_or("general");
    validate_alert_type(alert_type)?;
    let severity = payload.severity.as_deref().unwrap_or("advisory");
    validate_severity(severity)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let alert = sqlx::query_as::<_, EmergencyAlert>(&format!(
        r#"
        INSERT INTO emergency_alerts (alert_type, severity, title, message, location,
                                      issued_at, is_public, is_active)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()), $7, $8)
        RETURNING {}
        "#,
        ALERT_COLUMNS
    ))
    .bind(alert_type)
    .bind(severity)
    .bind(payload.title.trim())
    .bind(payload.message.trim())
    .bind(&payload.location)
    .bind(payload.issued_at)
    .bind(payload.is_public.unwrap_or(true))
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(pool.as_ref())
    .await?;

    tracing::info!(severity = %alert.severity, "Emergency alert issued: {}", alert.title);
    Ok((StatusCode::CREATED, Json(alert)))
}

/// PATCH /api/admin/alerts/{id} - Update an alert (auth required)
pub async fn update_alert(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAlertRequest>,
) -> Result<Json<EmergencyAlert>, ApiError> {
    require_auth(&headers)?;

    if let Some(alert_type) = &payload.alert_type {
        validate_alert_type(alert_type)?;
    }
    if let Some(severity) = &payload.severity {
        validate_severity(severity)?;
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = sqlx::query_as::<_, EmergencyAlert>(&format!(
        "SELECT {} FROM emergency_alerts WHERE id = $1",
        ALERT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Alert not found".to_string()))?;

    let alert = sqlx::query_as::<_, EmergencyAlert>(&format!(
        r#"
        UPDATE emergency_alerts
        SET alert_type = $1, severity = $2, title = $3, message = $4, location = $5,
            is_public = $6, is_active = $7, updated_at = now()
        WHERE id = $8
        RETURNING {}
        "#,
        ALERT_COLUMNS
    ))
    .bind(payload.alert_type.unwrap_or(existing.alert_type))
    .bind(payload.severity.unwrap_or(existing.severity))
    .bind(payload.title.unwrap_or(existing.title))
    .bind(payload.message.unwrap_or(existing.message))
    .bind(payload.location.or(existing.location))
    .bind(payload.is_public.unwrap_or(existing.is_public))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(alert))
}

/// DELETE /api/admin/alerts/{id} - Remove an alert (auth required)
pub async fn delete_alert(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM emergency_alerts WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Alert not found".to_string()));
    }
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_alert_type() {
        for t in ALERT_TYPES {
            assert!(validate_alert_type(t).is_ok());
        }
        assert!(validate_alert_type("volcano").is_err());
    }

    #[test]
    fn test_validate_severity() {
        for s in SEVERITIES {
            assert!(validate_severity(s).is_ok());
        }
        assert!(validate_severity("apocalyptic").is_err());
    }

    #[tokio::test]
    async fn test_public_list_without_pool_is_unavailable() {
        let result = list_public_alerts().await;
        assert!(matches!(result, Err(ApiError::PoolUnavailable)));
    }

    #[tokio::test]
    async fn test_create_requires_auth() {
        let payload = CreateAlertRequest {
            alert_type: None,
            severity: None,
            title: "Typhoon signal #2".to_string(),
            message: "Suspend classes".to_string(),
            location: None,
            issued_at: None,
            is_public: None,
            is_active: None,
        };
        let result = create_alert(HeaderMap::new(), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
