/**
 * Directory Routes
 * Emergency hotlines, the key-personnel staff directory, and the
 * organizational hierarchy chart
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    self,
    models::{EmergencyHotline, KeyPersonnel, OrgMember},
};
use crate::error::ApiError;
use crate::routes::auth::require_auth;

const HOTLINE_COLUMNS: &str =
    "id, name, number, description, sort_order, is_primary, created_at, updated_at";

const PERSONNEL_COLUMNS: &str =
    "id, name, designation, photo_url, bio, sort_order, is_active, created_at, updated_at";

const ORG_COLUMNS: &str =
    "id, name, designation, parent_id, sort_order, is_active, created_at, updated_at";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHotlineRequest {
    pub name: String,
    pub number: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHotlineRequest {
    pub name: Option<String>,
    pub number: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonnelRequest {
    pub name: String,
    pub designation: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonnelRequest {
    pub name: Option<String>,
    pub designation: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrgMemberRequest {
    pub name: String,
    pub designation: String,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrgMemberRequest {
    pub name: Option<String>,
    pub designation: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// One org-chart node with its reports nested beneath it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgNode {
    pub id: Uuid,
    pub name: String,
    pub designation: String,
    pub sort_order: i32,
    pub children: Vec<OrgNode>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Hotline handlers
// ============================================================================

/// GET /api/hotlines - Public hotline list, primary numbers first
pub async fn list_hotlines() -> Result<Json<Vec<EmergencyHotline>>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let hotlines = sqlx::query_as::<_, EmergencyHotline>(&format!(
        "SELECT {} FROM emergency_hotlines ORDER BY is_primary DESC, sort_order, name",
        HOTLINE_COLUMNS
    ))
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(hotlines))
}

/// POST /api/admin/hotlines - Add a hotline (auth required)
pub async fn create_hotline(
    headers: HeaderMap,
    Json(payload): Json<CreateHotlineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if payload.name.trim().is_empty() || payload.number.trim().is_empty() {
        return Err(ApiError::Validation(
            "Name and number are required".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let hotline = sqlx::query_as::<_, EmergencyHotline>(&format!(
        r#"
        INSERT INTO emergency_hotlines (name, number, description, sort_order, is_primary)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        HOTLINE_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(payload.number.trim())
    .bind(&payload.description)
    .bind(payload.sort_order.unwrap_or(0))
    .bind(payload.is_primary.unwrap_or(false))
    .fetch_one(pool.as_ref())
    .await?;

    Ok((StatusCode::CREATED, Json(hotline)))
}

/// PATCH /api/admin/hotlines/{id} - Update a hotline (auth required)
pub async fn update_hotline(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateHotlineRequest>,
) -> Result<Json<EmergencyHotline>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = sqlx::query_as::<_, EmergencyHotline>(&format!(
        "SELECT {} FROM emergency_hotlines WHERE id = $1",
        HOTLINE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Hotline not found".to_string()))?;

    let hotline = sqlx::query_as::<_, EmergencyHotline>(&format!(
        r#"
        UPDATE emergency_hotlines
        SET name = $1, number = $2, description = $3, sort_order = $4, is_primary = $5,
            updated_at = now()
        WHERE id = $6
        RETURNING {}
        "#,
        HOTLINE_COLUMNS
    ))
    .bind(payload.name.unwrap_or(existing.name))
    .bind(payload.number.unwrap_or(existing.number))
    .bind(payload.description.or(existing.description))
    .bind(payload.sort_order.unwrap_or(existing.sort_order))
    .bind(payload.is_primary.unwrap_or(existing.is_primary))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(hotline))
}

/// DELETE /api/admin/hotlines/{id} (auth required)
pub async fn delete_hotline(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM emergency_hotlines WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Hotline not found".to_string()));
    }
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Personnel handlers
// ============================================================================

/// GET /api/personnel - Public staff directory (active entries only)
pub async fn list_personnel() -> Result<Json<Vec<KeyPersonnel>>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let personnel = sqlx::query_as::<_, KeyPersonnel>(&format!(
        "SELECT {} FROM key_personnel WHERE is_active = true ORDER BY sort_order, name",
        PERSONNEL_COLUMNS
    ))
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(personnel))
}

/// POST /api/admin/personnel - Add a staff entry (auth required)
pub async fn create_personnel(
    headers: HeaderMap,
    Json(payload): Json<CreatePersonnelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if payload.name.trim().is_empty() || payload.designation.trim().is_empty() {
        return Err(ApiError::Validation(
            "Name and designation are required".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let person = sqlx::query_as::<_, KeyPersonnel>(&format!(
        r#"
        INSERT INTO key_personnel (name, designation, photo_url, bio, sort_order, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        PERSONNEL_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(payload.designation.trim())
    .bind(&payload.photo_url)
    .bind(&payload.bio)
    .bind(payload.sort_order.unwrap_or(0))
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(pool.as_ref())
    .await?;

    Ok((StatusCode::CREATED, Json(person)))
}

/// PATCH /api/admin/personnel/{id} (auth required)
pub async fn update_personnel(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePersonnelRequest>,
) -> Result<Json<KeyPersonnel>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = sqlx::query_as::<_, KeyPersonnel>(&format!(
        "SELECT {} FROM key_personnel WHERE id = $1",
        PERSONNEL_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Personnel entry not found".to_string()))?;

    let person = sqlx::query_as::<_, KeyPersonnel>(&format!(
        r#"
        UPDATE key_personnel
        SET name = $1, designation = $2, photo_url = $3, bio = $4, sort_order = $5,
            is_active = $6, updated_at = now()
        WHERE id = $7
        RETURNING {}
        "#,
        PERSONNEL_COLUMNS
    ))
    .bind(payload.name.unwrap_or(existing.name))
    .bind(payload.designation.unwrap_or(existing.designation))
    .bind(payload.photo_url.or(existing.photo_url))
    .bind(payload.bio.or(existing.bio))
    .bind(payload.sort_order.unwrap_or(existing.sort_order))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(person))
}

/// DELETE /api/admin/personnel/{id} (auth required)
pub async fn delete_personnel(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM key_personnel WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Personnel entry not found".to_string()));
    }
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Organization handlers
// ============================================================================

/// Assemble flat rows into the org tree. Every member surfaces exactly once:
/// nodes whose parent is missing or inactive become roots, and members caught
/// in a parent cycle (possible via manual row edits) are promoted to roots in
/// a final pass rather than dropped. Each node is attached at most once, so
/// the walk always terminates.
pub fn build_org_tree(members: &[OrgMember]) -> Vec<OrgNode> {
    fn attach(members: &[OrgMember], parent_id: Uuid, placed: &mut Vec<Uuid>) -> Vec<OrgNode> {
        let mut children = Vec::new();
        for m in members {
            if m.parent_id == Some(parent_id) && !placed.contains(&m.id) {
                placed.push(m.id);
                children.push(OrgNode {
                    id: m.id,
                    name: m.name.clone(),
                    designation: m.designation.clone(),
                    sort_order: m.sort_order,
                    children: attach(members, m.id, placed),
                });
            }
        }
        children
    }

    let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
    let mut placed: Vec<Uuid> = Vec::new();
    let mut roots = Vec::new();
    for m in members {
        let is_root = match m.parent_id {
            None => true,
            Some(parent) => !ids.contains(&parent),
        };
        if is_root && !placed.contains(&m.id) {
            placed.push(m.id);
            roots.push(OrgNode {
                id: m.id,
                name: m.name.clone(),
                designation: m.designation.clone(),
                sort_order: m.sort_order,
                children: attach(members, m.id, &mut placed),
            });
        }
    }

    // Members left unplaced sit inside a parent cycle; promote one per cycle
    // to a root and the attach pass picks up the rest beneath it.
    for m in members {
        if !placed.contains(&m.id) {
            placed.push(m.id);
            roots.push(OrgNode {
                id: m.id,
                name: m.name.clone(),
                designation: m.designation.clone(),
                sort_order: m.sort_order,
                children: attach(members, m.id, &mut placed),
            });
        }
    }

    roots
}

/// GET /api/organization - Public org chart (active members, nested)
pub async fn get_organization() -> Result<Json<Vec<OrgNode>>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let members = sqlx::query_as::<_, OrgMember>(&format!(
        "SELECT {} FROM organizational_hierarchy WHERE is_active = true ORDER BY sort_order, name",
        ORG_COLUMNS
    ))
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(build_org_tree(&members)))
}

/// POST /api/admin/organization - Add an org-chart member (auth required)
pub async fn create_org_member(
    headers: HeaderMap,
    Json(payload): Json<CreateOrgMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if payload.name.trim().is_empty() || payload.designation.trim().is_empty() {
        return Err(ApiError::Validation(
            "Name and designation are required".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    if let Some(parent_id) = payload.parent_id {
        let parent: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM organizational_hierarchy WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(pool.as_ref())
                .await?;
        if parent.is_none() {
            return Err(ApiError::Validation(
                "parentId does not reference an existing member".to_string(),
            ));
        }
    }

    let member = sqlx::query_as::<_, OrgMember>(&format!(
        r#"
        INSERT INTO organizational_hierarchy (name, designation, parent_id, sort_order, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        ORG_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(payload.designation.trim())
    .bind(payload.parent_id)
    .bind(payload.sort_order.unwrap_or(0))
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(pool.as_ref())
    .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

/// PATCH /api/admin/organization/{id} (auth required)
pub async fn update_org_member(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrgMemberRequest>,
) -> Result<Json<OrgMember>, ApiError> {
    require_auth(&headers)?;

    if payload.parent_id == Some(id) {
        return Err(ApiError::Validation(
            "A member cannot report to itself".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let existing = sqlx::query_as::<_, OrgMember>(&format!(
        "SELECT {} FROM organizational_hierarchy WHERE id = $1",
        ORG_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Organization member not found".to_string()))?;

    if let Some(parent_id) = payload.parent_id {
        let parent: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM organizational_hierarchy WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(pool.as_ref())
                .await?;
        if parent.is_none() {
            return Err(ApiError::Validation(
                "parentId does not reference an existing member".to_string(),
            ));
        }

        // Walk up from the proposed parent; reaching the member itself means
        // the member is an ancestor and the reparent would close a cycle.
        // Depth cap in case manual row edits already left one in the table.
        let mut cursor = Some(parent_id);
        let mut depth = 0;
        while let Some(current) = cursor {
            if current == id {
                return Err(ApiError::Validation(
                    "parentId would create a reporting cycle".to_string(),
                ));
            }
            depth += 1;
            if depth > 64 {
                break;
            }
            cursor = sqlx::query_as::<_, (Option<Uuid>,)>(
                "SELECT parent_id FROM organizational_hierarchy WHERE id = $1",
            )
            .bind(current)
            .fetch_optional(pool.as_ref())
            .await?
            .and_then(|row| row.0);
        }
    }

    let member = sqlx::query_as::<_, OrgMember>(&format!(
        r#"
        UPDATE organizational_hierarchy
        SET name = $1, designation = $2, parent_id = $3, sort_order = $4, is_active = $5,
            updated_at = now()
        WHERE id = $6
        RETURNING {}
        "#,
        ORG_COLUMNS
    ))
    .bind(payload.name.unwrap_or(existing.name))
    .bind(payload.designation.unwrap_or(existing.designation))
    .bind(payload.parent_id.or(existing.parent_id))
    .bind(payload.sort_order.unwrap_or(existing.sort_order))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    Ok(Json(member))
}

/// DELETE /api/admin/organization/{id} (auth required).
/// Children of the deleted member are detached to the root by the FK.
pub async fn delete_org_member(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_auth(&headers)?;

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let result = sqlx::query("DELETE FROM organizational_hierarchy WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "Organization member not found".to_string(),
        ));
    }
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hotlines_without_pool_is_unavailable() {
        assert!(matches!(
            list_hotlines().await,
            Err(ApiError::PoolUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_create_hotline_requires_auth() {
        let payload = CreateHotlineRequest {
            name: "MDRRMO Operations Center".to_string(),
            number: "(052) 123-4567".to_string(),
            description: None,
            sort_order: None,
            is_primary: Some(true),
        };
        let result = create_hotline(HeaderMap::new(), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    use chrono::Utc;

    fn member(name: &str, parent_id: Option<Uuid>, sort_order: i32) -> OrgMember {
        OrgMember {
            id: Uuid::new_v4(),
            name: name.to_string(),
            designation: format!("{} designation", name),
            parent_id,
            sort_order,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_org_tree_nests_reports_under_parents() {
        let head = member("MDRRM Officer", None, 0);
        let ops = member("Operations Chief", Some(head.id), 0);
        let admin = member("Admin Chief", Some(head.id), 1);
        let radio = member("Radio Operator", Some(ops.id), 0);

        let tree = build_org_tree(&[head.clone(), ops.clone(), admin, radio.clone()]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, head.id);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].id, ops.id);
        assert_eq!(tree[0].children[0].children[0].id, radio.id);
    }

    #[test]
    fn test_org_tree_orphan_becomes_root() {
        // Parent filtered out (e.g. inactive): the report surfaces at the top
        let orphan = member("Orphan", Some(Uuid::new_v4()), 0);
        let tree = build_org_tree(&[orphan.clone()]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, orphan.id);
    }

    #[test]
    fn test_org_tree_cycle_members_surface_exactly_once() {
        let mut a = member("A", None, 0);
        let mut b = member("B", None, 1);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);

        let tree = build_org_tree(&[a.clone(), b.clone()]);
        // Each points at the other, so neither is a natural root. The
        // promotion pass must still surface both, each exactly once.
        let mut seen: Vec<Uuid> = Vec::new();
        let mut stack: Vec<&OrgNode> = tree.iter().collect();
        while let Some(node) = stack.pop() {
            seen.push(node.id);
            stack.extend(node.children.iter());
        }
        seen.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_organization_without_pool_is_unavailable() {
        assert!(matches!(
            get_organization().await,
            Err(ApiError::PoolUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_create_org_member_requires_auth() {
        let payload = CreateOrgMemberRequest {
            name: "MDRRM Officer".to_string(),
            designation: "Department Head".to_string(),
            parent_id: None,
            sort_order: None,
            is_active: None,
        };
        let result = create_org_member(HeaderMap::new(), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_create_personnel_requires_auth() {
        let payload = CreatePersonnelRequest {
            name: "Juan Dela Cruz".to_string(),
            designation: "MDRRM Officer".to_string(),
            photo_url: None,
            bio: None,
            sort_order: None,
            is_active: None,
        };
        let result = create_personnel(HeaderMap::new(), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
