/**
 * Page Routes
 * Public page rendering plus the admin page/section CRUD behind it
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::compose::{compose, EditorBlock};
use crate::content::reorder::{plan_swap, Direction};
use crate::content::sections::{render_section, validate_data, SectionKind, SectionView};
use crate::content::slug::{derive_slug, is_valid_slug};
use crate::db::{
    self,
    models::{Page, PageSection},
};
use crate::error::{map_unique_violation, ApiError};
use crate::routes::auth::{maybe_claims, require_auth};

const PAGE_COLUMNS: &str = "id, slug, title, content, meta_description, meta_keywords, \
     hero_title, hero_subtitle, hero_image, status, template, featured, view_count, \
     created_at, updated_at";

const SECTION_COLUMNS: &str =
    "id, page_id, kind, title, content, data, order_index, is_active, created_at, updated_at";

const KNOWN_TEMPLATES: &[&str] = &[
    "default",
    "about",
    "services",
    "news",
    "resources",
    "disaster-plan",
];

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PUBLISHED: &str = "published";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub status: Option<String>,
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
pub struct PageListResponse {
    pub items: Vec<PageSummary>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub status: String,
    pub template: String,
    pub featured: bool,
    pub view_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// A fully resolved page: metadata, ordered active sections, and the
/// concatenated render of those sections.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    #[serde(flatten)]
    pub page: Page,
    pub sections: Vec<PageSection>,
    pub rendered_html: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub content: String,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    pub hero_image: Option<String>,
    pub status: Option<String>,
    pub template: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    pub hero_image: Option<String>,
    pub status: Option<String>,
    pub template: Option<String>,
    pub featured: Option<bool>,
}

/// Body for PUT /api/pages/{slug}/content: ordered editor blocks flattened
/// into the page's legacy content field.
#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub blocks: Vec<EditorBlock>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeResponse {
    pub success: bool,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    pub kind: String,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    pub order_index: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSectionRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub data: Option<Value>,
    pub order_index: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Validation helpers
// ============================================================================

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

fn validate_template(template: &str) -> Result<(), ApiError> {
    if KNOWN_TEMPLATES.contains(&template) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Unknown template '{}'. Known templates: {:?}",
            template, KNOWN_TEMPLATES
        )))
    }
}

fn parse_kind(kind: &str) -> Result<SectionKind, ApiError> {
    SectionKind::parse(kind)
        .ok_or_else(|| ApiError::Validation(format!("Unknown section kind '{}'", kind)))
}

/// Validate a section payload against its kind's schema. Mis-shaped data is
/// rejected here, before anything is written, never discovered at render time.
fn validate_section_data(kind: SectionKind, data: &Value) -> Result<(), ApiError> {
    validate_data(kind, data).map_err(ApiError::Schema)
}

/// Whether content in `status` may be served to this caller. Unpublished
/// content is only visible to authenticated staff; everyone else gets the
/// same 404 a missing record would produce.
pub fn visible_to(status: &str, staff: bool) -> bool {
    status == STATUS_PUBLISHED || staff
}

fn render_sections_html(sections: &[PageSection]) -> String {
    let mut html = String::new();
    for section in sections {
        // Unknown kinds can only come from rows predating the closed enum;
        // skip them rather than failing the whole page.
        let Some(kind) = SectionKind::parse(&section.kind) else {
            tracing::warn!(section_id = %section.id, kind = %section.kind, "skipping section with unknown kind");
            continue;
        };
        html.push_str(&render_section(&SectionView {
            kind,
            title: section.title.as_deref(),
            content: section.content.as_deref(),
            data: &section.data,
        }));
    }
    html
}

async fn fetch_page_by_slug(pool: &sqlx::PgPool, slug: &str) -> Result<Option<Page>, ApiError> {
    let page = sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE slug = $1",
        PAGE_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(page)
}

async fn fetch_sections(
    pool: &sqlx::PgPool,
    page_id: Uuid,
    active_only: bool,
) -> Result<Vec<PageSection>, ApiError> {
    let filter = if active_only { "AND is_active = true" } else { "" };
    let sections = sqlx::query_as::<_, PageSection>(&format!(
        "SELECT {} FROM page_sections WHERE page_id = $1 {} ORDER BY order_index, created_at",
        SECTION_COLUMNS, filter
    ))
    .bind(page_id)
    .fetch_all(pool)
    .await?;
    Ok(sections)
}

/// Fire-and-forget view counting: eventually consistent, never blocks the
/// response.
fn record_page_view(page_id: Uuid, slug: String) {
    let Some(pool) = db::get_pool() else { return };
    tokio::spawn(async move {
        if let Err(e) = sqlx::query("UPDATE pages SET view_count = view_count + 1 WHERE id = $1")
            .bind(page_id)
            .execute(pool.as_ref())
            .await
        {
            tracing::warn!("failed to increment view count for {}: {}", slug, e);
        }
        let _ = sqlx::query(
            "INSERT INTO analytics_events (event_type, entity_id, entity_slug) VALUES ('page_view', $1, $2)",
        )
        .bind(page_id)
        .bind(&slug)
        .execute(pool.as_ref())
        .await;
    });
}

// ============================================================================
// Page handlers
// ============================================================================

/// GET /api/pages - List pages with pagination.
/// Anonymous callers only see published pages; authenticated staff see all
/// and may filter by status.
pub async fn list_pages(
    headers: HeaderMap,
    Query(query): Query<PageListQuery>,
) -> Result<Json<PageListResponse>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let page_size = query.page_size.clamp(1, 100);
    let page = query.page.max(1);
    let offset = (page - 1) * page_size;

    let status_filter = if maybe_claims(&headers).is_some() {
        query.status.clone()
    } else {
        Some(STATUS_PUBLISHED.to_string())
    };
    if let Some(status) = &status_filter {
        validate_status(status)?;
    }

    // NULL filter params mean "no filter"; keeps one statement for all combos.
    let pages = sqlx::query_as::<_, Page>(&format!(
        r#"
        SELECT {} FROM pages
        WHERE ($3::text IS NULL OR status = $3)
          AND ($4::boolean IS NULL OR featured = $4)
        ORDER BY updated_at DESC
        LIMIT $1 OFFSET $2
        "#,
        PAGE_COLUMNS
    ))
    .bind(page_size)
    .bind(offset)
    .bind(&status_filter)
    .bind(query.featured)
    .fetch_all(pool.as_ref())
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM pages
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::boolean IS NULL OR featured = $2)
        "#,
    )
    .bind(&status_filter)
    .bind(query.featured)
    .fetch_one(pool.as_ref())
    .await?;

    let items = pages
        .into_iter()
        .map(|p| PageSummary {
            id: p.id,
            slug: p.slug,
            title: p.title,
            status: p.status,
            template: p.template,
            featured: p.featured,
            view_count: p.view_count,
            updated_at: p.updated_at,
        })
        .collect();

    Ok(Json(PageListResponse {
        items,
        page,
        page_size,
        total: total.0,
    }))
}

/// GET /api/pages/{slug} - Resolve a page for display.
/// Drafts are a hard 404 for anonymous callers; staff tokens see them.
pub async fn get_page(
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<RenderedPage>, ApiError> {
    if !is_valid_slug(&slug) {
        return Err(ApiError::Validation(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let staff = maybe_claims(&headers).is_some();

    let page = fetch_page_by_slug(pool.as_ref(), &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Page not found".to_string()))?;

    if !visible_to(&page.status, staff) {
        // Drafts must be indistinguishable from missing pages publicly.
        return Err(ApiError::NotFound("Page not found".to_string()));
    }

    let sections = fetch_sections(pool.as_ref(), page.id, true).await?;
    let rendered_html = render_sections_html(&sections);

    if !staff {
        record_page_view(page.id, page.slug.clone());
    }

    Ok(Json(RenderedPage {
        page,
        sections,
        rendered_html,
    }))
}

/// POST /api/pages - Create a page (auth required).
/// Derives the slug from the title when none is supplied.
pub async fn create_page(
    headers: HeaderMap,
    Json(payload): Json<CreatePageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("Content is required".to_string()));
    }

    let slug = match payload.slug.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(explicit) => {
            if !is_valid_slug(explicit) {
                return Err(ApiError::Validation(
                    "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
                ));
            }
            explicit.to_string()
        }
        None => {
            let derived = derive_slug(&payload.title);
            if derived.is_empty() {
                return Err(ApiError::Validation(
                    "Could not derive a slug from the title; supply one explicitly".to_string(),
                ));
            }
            derived
        }
    };

    let status = payload.status.as_deref().unwrap_or(STATUS_DRAFT);
    validate_status(status)?;
    let template = payload.template.as_deref().unwrap_or("default");
    validate_template(template)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    // Application-level pre-check; the unique index on slug is the guarantee.
    if fetch_page_by_slug(pool.as_ref(), &slug).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "A page with slug '{}' already exists",
            slug
        )));
    }

    let page = sqlx::query_as::<_, Page>(&format!(
        r#"
        INSERT INTO pages (slug, title, content, meta_description, meta_keywords,
                           hero_title, hero_subtitle, hero_image, status, template, featured)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        PAGE_COLUMNS
    ))
    .bind(&slug)
    .bind(payload.title.trim())
    .bind(&payload.content)
    .bind(&payload.meta_description)
    .bind(&payload.meta_keywords)
    .bind(&payload.hero_title)
    .bind(&payload.hero_subtitle)
    .bind(&payload.hero_image)
    .bind(status)
    .bind(template)
    .bind(payload.featured.unwrap_or(false))
    .fetch_one(pool.as_ref())
    .await
    .map_err(|e| map_unique_violation(e, "A page with this slug already exists"))?;

    tracing::info!("Page created: {}", page.slug);

    Ok((StatusCode::CREATED, Json(page)))
}

/// PATCH /api/pages/{slug} - Update a page (auth required).
/// The slug itself is stable once created; it is the public routing key.
pub async fn update_page(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(payload): Json<UpdatePageRequest>,
) -> Result<Json<Page>, ApiError> {
    require_auth(&headers)?;

    if let Some(status) = &payload.status {
        validate_status(status)?;
    }
    if let Some(template) = &payload.template {
        validate_template(template)?;
    }
    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("Title cannot be empty".to_string()));
        }
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = fetch_page_by_slug(pool.as_ref(), &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Page not found".to_string()))?;

    let page = sqlx::query_as::<_, Page>(&format!(
        r#"
        UPDATE pages
        SET title = $1, content = $2, meta_description = $3, meta_keywords = $4,
            hero_title = $5, hero_subtitle = $6, hero_image = $7,
            status = $8, template = $9, featured = $10, updated_at = now()
        WHERE slug = $11
        RETURNING {}
        "#,
        PAGE_COLUMNS
    ))
    .bind(payload.title.unwrap_or(existing.title))
    .bind(payload.content.unwrap_or(existing.content))
    .bind(payload.meta_description.or(existing.meta_description))
    .bind(payload.meta_keywords.or(existing.meta_keywords))
    .bind(payload.hero_title.or(existing.hero_title))
    .bind(payload.hero_subtitle.or(existing.hero_subtitle))
    .bind(payload.hero_image.or(existing.hero_image))
    .bind(payload.status.unwrap_or(existing.status))
    .bind(payload.template.unwrap_or(existing.template))
    .bind(payload.featured.unwrap_or(existing.featured))
    .bind(&slug)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(page))
}

/// DELETE /api/pages/{slug} - Delete a page and its sections (auth required)
pub async fn delete_page(
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let result = sqlx::query("DELETE FROM pages WHERE slug = $1")
        .bind(&slug)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Page not found".to_string()));
    }

    tracing::info!("Page deleted: {}", slug);
    Ok(Json(SuccessResponse { success: true }))
}

/// PUT /api/pages/{slug}/content - Replace the page's content with the
/// flattened output of the raw-block editor (auth required).
pub async fn compose_content(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(payload): Json<ComposeRequest>,
) -> Result<Json<ComposeResponse>, ApiError> {
    require_auth(&headers)?;

    if payload.blocks.is_empty() {
        return Err(ApiError::Validation(
            "At least one block is required".to_string(),
        ));
    }

    let content = compose(&payload.blocks);

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("UPDATE pages SET content = $1, updated_at = now() WHERE slug = $2")
        .bind(&content)
        .bind(&slug)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Page not found".to_string()));
    }

    Ok(Json(ComposeResponse {
        success: true,
        content,
    }))
}

// ============================================================================
// Section handlers
// ============================================================================

/// GET /api/pages/{slug}/sections - All sections including inactive ones
/// (auth required; the public render already embeds the active sections).
pub async fn list_sections(
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<Vec<PageSection>>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let page = fetch_page_by_slug(pool.as_ref(), &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Page not found".to_string()))?;

    let sections = fetch_sections(pool.as_ref(), page.id, false).await?;
    Ok(Json(sections))
}

/// POST /api/pages/{slug}/sections - Append a section (auth required).
/// Auto-assigns max(order_index)+1 when the caller omits the index.
pub async fn create_section(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(payload): Json<CreateSectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    let kind = parse_kind(&payload.kind)?;
    let data = payload.data.unwrap_or_else(|| serde_json::json!({}));
    validate_section_data(kind, &data)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let page = fetch_page_by_slug(pool.as_ref(), &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Page not found".to_string()))?;

    let order_index = match payload.order_index {
        Some(idx) => idx,
        None => {
            let max: (Option<i32>,) =
                sqlx::query_as("SELECT MAX(order_index) FROM page_sections WHERE page_id = $1")
                    .bind(page.id)
                    .fetch_one(pool.as_ref())
                    .await?;
            max.0.map(|m| m + 1).unwrap_or(0)
        }
    };

    let section = sqlx::query_as::<_, PageSection>(&format!(
        r#"
        INSERT INTO page_sections (page_id, kind, title, content, data, order_index, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        SECTION_COLUMNS
    ))
    .bind(page.id)
    .bind(kind.as_str())
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&data)
    .bind(order_index)
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(pool.as_ref())
    .await?;

    Ok((StatusCode::CREATED, Json(section)))
}

/// PATCH /api/sections/{id} - Update a section (auth required).
/// A changed `data` payload is re-validated against the section's kind.
pub async fn update_section(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSectionRequest>,
) -> Result<Json<PageSection>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = sqlx::query_as::<_, PageSection>(&format!(
        "SELECT {} FROM page_sections WHERE id = $1",
        SECTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))?;

    let kind = parse_kind(&existing.kind)?;
    let data = match payload.data {
        Some(data) => {
            validate_section_data(kind, &data)?;
            data
        }
        None => existing.data,
    };

    let section = sqlx::query_as::<_, PageSection>(&format!(
        r#"
        UPDATE page_sections
        SET title = $1, content = $2, data = $3, order_index = $4, is_active = $5,
            updated_at = now()
        WHERE id = $6
        RETURNING {}
        "#,
        SECTION_COLUMNS
    ))
    .bind(payload.title.or(existing.title))
    .bind(payload.content.or(existing.content))
    .bind(&data)
    .bind(payload.order_index.unwrap_or(existing.order_index))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(section))
}

/// DELETE /api/sections/{id} - Remove a section (auth required)
pub async fn delete_section(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM page_sections WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Section not found".to_string()));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/sections/{id}/reorder - Swap a section with its neighbor
/// (auth required). Boundary moves are a successful no-op.
pub async fn reorder_section(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let page_id: Option<(Uuid,)> =
        sqlx::query_as("SELECT page_id FROM page_sections WHERE id = $1")
            .bind(id)
            .fetch_optional(pool.as_ref())
            .await?;
    let Some((page_id,)) = page_id else {
        return Err(ApiError::NotFound("Section not found".to_string()));
    };

    let ordered: Vec<(Uuid, i32)> = sqlx::query_as(
        "SELECT id, order_index FROM page_sections WHERE page_id = $1 ORDER BY order_index, created_at",
    )
    .bind(page_id)
    .fetch_all(pool.as_ref())
    .await?;

    let writes = plan_swap(&ordered, id, payload.direction)
        .map_err(ApiError::NotFound)?;

    if let Some(writes) = writes {
        let mut tx = pool.begin().await?;
        for w in writes {
            sqlx::query(
                "UPDATE page_sections SET order_index = $1, updated_at = now() WHERE id = $2",
            )
            .bind(w.order_index)
            .bind(w.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
    }

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn section(kind: &str, order_index: i32, active: bool, data: Value) -> PageSection {
        PageSection {
            id: Uuid::new_v4(),
            page_id: Uuid::new_v4(),
            kind: kind.to_string(),
            title: Some(format!("{} section", kind)),
            content: None,
            data,
            order_index,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_sections_follows_order_index() {
        // stats at index 1, cards at index 2: stats must render first
        let sections = vec![
            section("stats", 1, true, json!({ "stats": [{ "value": 1, "label": "L" }] })),
            section("cards", 2, true, json!({ "cards": [{ "title": "C", "description": "D" }] })),
        ];
        let html = render_sections_html(&sections);
        let stats_pos = html.find("class=\"stats\"").unwrap();
        let cards_pos = html.find("class=\"cards\"").unwrap();
        assert!(stats_pos < cards_pos);
    }

    #[test]
    fn test_render_sections_skips_unknown_kind() {
        let sections = vec![
            section("marquee", 0, true, json!({})),
            section("content", 1, true, json!({})),
        ];
        let html = render_sections_html(&sections);
        assert!(!html.contains("marquee"));
        assert!(html.contains("class=\"content\""));
    }

    #[test]
    fn test_validate_status() {
        assert!(validate_status("draft").is_ok());
        assert!(validate_status("published").is_ok());
        assert!(validate_status("archived").is_err());
    }

    #[test]
    fn test_drafts_hidden_from_anonymous_callers() {
        assert!(!visible_to(STATUS_DRAFT, false));
        assert!(visible_to(STATUS_DRAFT, true));
    }

    #[test]
    fn test_published_visible_to_everyone() {
        assert!(visible_to(STATUS_PUBLISHED, false));
        assert!(visible_to(STATUS_PUBLISHED, true));
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("default").is_ok());
        assert!(validate_template("disaster-plan").is_ok());
        assert!(validate_template("bespoke").is_err());
    }

    #[test]
    fn test_parse_kind_rejects_unknown() {
        assert!(parse_kind("cards").is_ok());
        assert!(matches!(parse_kind("widget"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_mis_shaped_data_is_schema_error() {
        let bad = json!({ "cards": [{ "description": "missing title" }] });
        assert!(matches!(
            validate_section_data(SectionKind::Cards, &bad),
            Err(ApiError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn test_get_page_without_pool_is_unavailable() {
        let result = get_page(HeaderMap::new(), Path("some-page".to_string())).await;
        assert!(matches!(result, Err(ApiError::PoolUnavailable)));
    }

    #[tokio::test]
    async fn test_get_page_invalid_slug_is_validation_error() {
        let result = get_page(HeaderMap::new(), Path("Not A Slug!".to_string())).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_page_requires_auth() {
        let payload = CreatePageRequest {
            title: "T".to_string(),
            slug: None,
            content: "c".to_string(),
            meta_description: None,
            meta_keywords: None,
            hero_title: None,
            hero_subtitle: None,
            hero_image: None,
            status: None,
            template: None,
            featured: None,
        };
        let result = create_page(HeaderMap::new(), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
