/**
 * Resource Routes
 * Downloadable document directory with download counting
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, models::Resource};
use crate::error::ApiError;
use crate::routes::auth::{maybe_claims, require_auth};
use crate::routes::pages::{visible_to, STATUS_DRAFT, STATUS_PUBLISHED};

const RESOURCE_COLUMNS: &str = "id, title, description, file_url, file_type, file_size, \
     category, tags, featured, status, download_count, created_at, updated_at";

const FILE_TYPES: &[&str] = &["pdf", "doc", "docx", "image", "video", "other"];
const CATEGORIES: &[&str] = &["guide", "form", "report", "map", "plan", "other"];

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
});

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub category: Option<String>,
    /// Matches against title and tags.
    pub search: Option<String>,
    pub featured: Option<bool>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListResponse {
    pub items: Vec<Resource>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub featured: Option<bool>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub status: Option<String>,
}

/// Response for POST /api/resources/{id}/download: the client fetches the
/// file itself from `file_url`; the server only vouches for reachability.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub file_url: String,
    pub download_count: i64,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Validation
// ============================================================================

fn validate_file_type(file_type: &str) -> Result<(), ApiError> {
    if FILE_TYPES.contains(&file_type) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid file type '{}'. Valid types: {:?}",
            file_type, FILE_TYPES
        )))
    }
}

fn validate_category(category: &str) -> Result<(), ApiError> {
    if CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid category '{}'. Valid categories: {:?}",
            category, CATEGORIES
        )))
    }
}

fn validate_status(status: &str) -> Result<(), ApiError> {
    if status == STATUS_DRAFT || status == STATUS_PUBLISHED {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid status '{}'. Must be 'draft' or 'published'",
            status
        )))
    }
}

fn validate_url(url: &str) -> Result<(), ApiError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "file_url must be an absolute http(s) URL".to_string(),
        ))
    }
}

async fn fetch_resource(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Resource>, ApiError> {
    let resource = sqlx::query_as::<_, Resource>(&format!(
        "SELECT {} FROM resources WHERE id = $1",
        RESOURCE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(resource)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/resources - List resources.
/// Anonymous callers see published resources only.
pub async fn list_resources(
    headers: HeaderMap,
    Query(query): Query<ResourceListQuery>,
) -> Result<Json<ResourceListResponse>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    if let Some(category) = &query.category {
        validate_category(category)?;
    }

    let page_size = query.page_size.clamp(1, 100);
    let page = query.page.max(1);
    let offset = (page - 1) * page_size;

    let status_filter = if maybe_claims(&headers).is_some() {
        None
    } else {
        Some(STATUS_PUBLISHED.to_string())
    };
    let search = query.search.as_ref().map(|s| format!("%{}%", s));

    let items = sqlx::query_as::<_, Resource>(&format!(
        r#"
        SELECT {} FROM resources
        WHERE ($3::text IS NULL OR status = $3)
          AND ($4::text IS NULL OR category = $4)
          AND ($5::boolean IS NULL OR featured = $5)
          AND ($6::text IS NULL OR title ILIKE $6
               OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE $6))
        ORDER BY featured DESC, created_at DESC
        LIMIT $1 OFFSET $2
        "#,
        RESOURCE_COLUMNS
    ))
    .bind(page_size)
    .bind(offset)
    .bind(&status_filter)
    .bind(&query.category)
    .bind(query.featured)
    .bind(&search)
    .fetch_all(pool.as_ref())
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM resources
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR category = $2)
          AND ($3::boolean IS NULL OR featured = $3)
          AND ($4::text IS NULL OR title ILIKE $4
               OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE $4))
        "#,
    )
    .bind(&status_filter)
    .bind(&query.category)
    .bind(query.featured)
    .bind(&search)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(ResourceListResponse {
        items,
        page,
        page_size,
        total: total.0,
    }))
}

/// GET /api/resources/{id} - Fetch one resource
pub async fn get_resource(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Resource>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let resource = fetch_resource(pool.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    if !visible_to(&resource.status, maybe_claims(&headers).is_some()) {
        return Err(ApiError::NotFound("Resource not found".to_string()));
    }

    Ok(Json(resource))
}

/// POST /api/resources - Create a resource (auth required)
pub async fn create_resource(
    headers: HeaderMap,
    Json(payload): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    validate_url(&payload.file_url)?;

    let file_type = payload.file_type.as_deref().unwrap_or("other");
    validate_file_type(file_type)?;
    let category = payload.category.as_deref().unwrap_or("other");
    validate_category(category)?;
    let status = payload.status.as_deref().unwrap_or(STATUS_DRAFT);
    validate_status(status)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let resource = sqlx::query_as::<_, Resource>(&format!(
        r#"
        INSERT INTO resources (title, description, file_url, file_type, file_size,
                               category, tags, featured, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        RESOURCE_COLUMNS
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(&payload.file_url)
    .bind(file_type)
    .bind(payload.file_size)
    .bind(category)
    .bind(&payload.tags)
    .bind(payload.featured.unwrap_or(false))
    .bind(status)
    .fetch_one(pool.as_ref())
    .await?;

    tracing::info!("Resource created: {}", resource.title);
    Ok((StatusCode::CREATED, Json(resource)))
}

/// PATCH /api/resources/{id} - Update a resource (auth required)
pub async fn update_resource(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResourceRequest>,
) -> Result<Json<Resource>, ApiError> {
    require_auth(&headers)?;

    if let Some(file_type) = &payload.file_type {
        validate_file_type(file_type)?;
    }
    if let Some(category) = &payload.category {
        validate_category(category)?;
    }
    if let Some(status) = &payload.status {
        validate_status(status)?;
    }
    if let Some(url) = &payload.file_url {
        validate_url(url)?;
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = fetch_resource(pool.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    let resource = sqlx::query_as::<_, Resource>(&format!(
        r#"
        UPDATE resources
        SET title = $1, description = $2, file_url = $3, file_type = $4, file_size = $5,
            category = $6, tags = $7, featured = $8, status = $9, updated_at = now()
        WHERE id = $10
        RETURNING {}
        "#,
        RESOURCE_COLUMNS
    ))
    .bind(payload.title.unwrap_or(existing.title))
    .bind(payload.description.or(existing.description))
    .bind(payload.file_url.unwrap_or(existing.file_url))
    .bind(payload.file_type.unwrap_or(existing.file_type))
    .bind(payload.file_size.or(existing.file_size))
    .bind(payload.category.unwrap_or(existing.category))
    .bind(payload.tags.unwrap_or(existing.tags))
    .bind(payload.featured.unwrap_or(existing.featured))
    .bind(payload.status.unwrap_or(existing.status))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(resource))
}

/// DELETE /api/resources/{id} - Remove a resource (auth required)
pub async fn delete_resource(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM resources WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Resource not found".to_string()));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/resources/{id}/download - Start a download.
///
/// Verifies the file host answers a HEAD request before handing the URL back;
/// a failure maps to `RemoteUnavailable` so the client can offer retry or
/// open-in-new-tab. The count increment is best-effort and not transactional
/// with the transfer itself.
pub async fn download_resource(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let resource = fetch_resource(pool.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    if !visible_to(&resource.status, maybe_claims(&headers).is_some()) {
        return Err(ApiError::NotFound("Resource not found".to_string()));
    }

    let head = HTTP_CLIENT.head(&resource.file_url).send().await;
    match head {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => {
            tracing::warn!(
                resource_id = %id,
                status = %response.status(),
                "file host rejected HEAD request"
            );
            return Err(ApiError::RemoteUnavailable(
                "The file is currently unreachable. Retry or open the link directly.".to_string(),
            ));
        }
        Err(e) => {
            tracing::warn!(resource_id = %id, error = %e, "file host HEAD request failed");
            return Err(ApiError::RemoteUnavailable(
                "The file is currently unreachable. Retry or open the link directly.".to_string(),
            ));
        }
    }

    let updated: (i64,) = sqlx::query_as(
        "UPDATE resources SET download_count = download_count + 1 WHERE id = $1 RETURNING download_count",
    )
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    let _ = sqlx::query(
        "INSERT INTO analytics_events (event_type, entity_id) VALUES ('resource_download', $1)",
    )
    .bind(id)
    .execute(pool.as_ref())
    .await;

    Ok(Json(DownloadResponse {
        file_url: resource.file_url,
        download_count: updated.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_type() {
        assert!(validate_file_type("pdf").is_ok());
        assert!(validate_file_type("other").is_ok());
        assert!(validate_file_type("exe").is_err());
    }

    #[test]
    fn test_draft_resources_hidden_without_token() {
        // get_resource and download_resource both gate on this decision.
        assert!(!visible_to(STATUS_DRAFT, false));
        assert!(visible_to(STATUS_DRAFT, true));
        assert!(visible_to(STATUS_PUBLISHED, false));
    }

    #[test]
    fn test_validate_category() {
        assert!(validate_category("guide").is_ok());
        assert!(validate_category("map").is_ok());
        assert!(validate_category("misc").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://files.example.gov/plan.pdf").is_ok());
        assert!(validate_url("http://files.example.gov/plan.pdf").is_ok());
        assert!(validate_url("ftp://files.example.gov/plan.pdf").is_err());
        assert!(validate_url("/relative/path.pdf").is_err());
    }

    #[tokio::test]
    async fn test_download_without_pool_is_unavailable() {
        let result = download_resource(HeaderMap::new(), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(ApiError::PoolUnavailable)));
    }

    #[tokio::test]
    async fn test_create_requires_auth() {
        let payload = CreateResourceRequest {
            title: "Evacuation Plan".to_string(),
            description: None,
            file_url: "https://files.example.gov/plan.pdf".to_string(),
            file_type: None,
            file_size: None,
            category: None,
            tags: vec![],
            featured: None,
            status: None,
        };
        let result = create_resource(HeaderMap::new(), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
