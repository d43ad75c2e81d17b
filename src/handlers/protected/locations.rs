use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::{LocationLevel, LocationNode};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::policy;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChildrenQuery {
    pub parent: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLocation {
    pub name: String,
    pub parent_id: Option<i64>,
}

fn parse_level(segment: &str) -> Result<LocationLevel, ApiError> {
    LocationLevel::from_plural(segment)
        .ok_or_else(|| ApiError::not_found(format!("unknown location level '{}'", segment)))
}

/// GET /api/locations/:level?parent=… - children of a parent node, used to
/// populate the cascading dropdowns. Buildings take no parent.
pub async fn level_get(
    State(state): State<AppState>,
    Extension(_actor): Extension<AuthUser>,
    Path(segment): Path<String>,
    Query(query): Query<ChildrenQuery>,
) -> ApiResult<Vec<LocationNode>> {
    let level = parse_level(&segment)?;
    if level != LocationLevel::Building && query.parent.is_none() {
        return Err(ApiError::field_error(
            "parent",
            format!("required when listing {}", segment),
        ));
    }
    let nodes = state.store.locations_by_parent(level, query.parent).await?;
    Ok(ApiResponse::success(nodes))
}

/// POST /api/locations/:level - admin-only node creation. The parent must
/// exist one level up; buildings take no parent.
pub async fn level_post(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(segment): Path<String>,
    Json(req): Json<CreateLocation>,
) -> ApiResult<LocationNode> {
    policy::authorize_admin(&actor)?;
    let level = parse_level(&segment)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::field_error("name", "This field is required"));
    }

    match level.parent() {
        None => {
            if req.parent_id.is_some() {
                return Err(ApiError::field_error("parent_id", "buildings have no parent"));
            }
        }
        Some(parent_level) => {
            let parent_id = req.parent_id.ok_or_else(|| {
                ApiError::field_error("parent_id", "This field is required")
            })?;
            if state
                .store
                .location_by_id(parent_level, parent_id)
                .await?
                .is_none()
            {
                return Err(ApiError::field_error(
                    "parent_id",
                    format!("unknown {} {}", parent_level.as_str(), parent_id),
                ));
            }
        }
    }

    let node = state
        .store
        .insert_location(level, name, req.parent_id)
        .await?;
    Ok(ApiResponse::created(node))
}
