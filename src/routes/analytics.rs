/**
 * Analytics Routes
 * Event recording and the admin dashboard summary
 */
use axum::{http::HeaderMap, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::routes::auth::require_auth;

const EVENT_TYPES: &[&str] = &["page_view", "resource_download"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Client-submitted event (the render/download paths also record events
/// server-side; this endpoint covers client-only interactions).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventRequest {
    pub event_type: String,
    pub entity_id: Option<Uuid>,
    pub entity_slug: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackEventResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPage {
    pub slug: String,
    pub title: String,
    pub view_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopResource {
    pub id: Uuid,
    pub title: String,
    pub download_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub generated_at: DateTime<Utc>,
    pub total_page_views: i64,
    pub total_downloads: i64,
    pub events_last_7_days: i64,
    pub top_pages: Vec<TopPage>,
    pub top_resources: Vec<TopResource>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/analytics/events - Record one event (public, fire-and-forget
/// from the caller's perspective)
pub async fn track_event(
    Json(payload): Json<TrackEventRequest>,
) -> Result<Json<TrackEventResponse>, ApiError> {
    if !EVENT_TYPES.contains(&payload.event_type.as_str()) {
        return Err(ApiError::Validation(format!(
            "Unknown event type '{}'. Valid types: {:?}",
            payload.event_type, EVENT_TYPES
        )));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    sqlx::query(
        "INSERT INTO analytics_events (event_type, entity_id, entity_slug) VALUES ($1, $2, $3)",
    )
    .bind(&payload.event_type)
    .bind(payload.entity_id)
    .bind(&payload.entity_slug)
    .execute(pool.as_ref())
    .await?;

    Ok(Json(TrackEventResponse { success: true }))
}

/// GET /api/admin/analytics/summary - Dashboard numbers (auth required).
/// Counters are eventually consistent; these are trends, not ledgers.
pub async fn summary(headers: HeaderMap) -> Result<Json<AnalyticsSummary>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let total_page_views: (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(view_count), 0)::BIGINT FROM pages")
            .fetch_one(pool.as_ref())
            .await?;

    let total_downloads: (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(download_count), 0)::BIGINT FROM resources")
            .fetch_one(pool.as_ref())
            .await?;

    let week_ago = Utc::now() - Duration::days(7);
    let recent_events: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM analytics_events WHERE occurred_at >= $1")
            .bind(week_ago)
            .fetch_one(pool.as_ref())
            .await?;

    let top_pages: Vec<(String, String, i64)> = sqlx::query_as(
        r#"
        SELECT slug, title, view_count
        FROM pages
        WHERE status = 'published'
        ORDER BY view_count DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool.as_ref())
    .await?;

    let top_resources: Vec<(Uuid, String, i64)> = sqlx::query_as(
        r#"
        SELECT id, title, download_count
        FROM resources
        WHERE status = 'published'
        ORDER BY download_count DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(AnalyticsSummary {
        generated_at: Utc::now(),
        total_page_views: total_page_views.0,
        total_downloads: total_downloads.0,
        events_last_7_days: recent_events.0,
        top_pages: top_pages
            .into_iter()
            .map(|(slug, title, view_count)| TopPage {
                slug,
                title,
                view_count,
            })
            .collect(),
        top_resources: top_resources
            .into_iter()
            .map(|(id, title, download_count)| TopResource {
                id,
                title,
                download_count,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_event_type_rejected() {
        let payload = TrackEventRequest {
            event_type: "mouse_move".to_string(),
            entity_id: None,
            entity_slug: None,
        };
        let result = track_event(Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_summary_requires_auth() {
        let result = summary(HeaderMap::new()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_track_event_without_pool_is_unavailable() {
        let payload = TrackEventRequest {
            event_type: "page_view".to_string(),
            entity_id: None,
            entity_slug: Some("home".to_string()),
        };
        let result = track_event(Json(payload)).await;
        assert!(matches!(result, Err(ApiError::PoolUnavailable)));
    }
}
