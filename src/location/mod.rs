//! Location hierarchy resolution.
//!
//! Turns a ticket submission's location input (ids, display names, or a mix)
//! into five validated, mutually consistent foreign-key references. Ids take
//! precedence and must chain onto the level above; names are looked up
//! scoped to the already-resolved parent, so identically-named siblings
//! under different parents stay distinct. Resolution is fail-fast: the first
//! level that cannot be resolved aborts the whole operation.

use serde::Deserialize;

use crate::database::models::{LocationLevel, LocationNode, ResolvedLocation};
use crate::database::store::Store;
use crate::error::ApiError;

/// Raw location selection as submitted by the client. Any mix of ids and
/// names; per level, a supplied id wins over a name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationInput {
    pub building_id: Option<i64>,
    pub building: Option<String>,
    pub floor_id: Option<i64>,
    pub floor: Option<String>,
    pub room_id: Option<i64>,
    pub room: Option<String>,
    pub area_id: Option<i64>,
    pub area: Option<String>,
    pub element_id: Option<i64>,
    pub element: Option<String>,
}

impl LocationInput {
    fn at(&self, level: LocationLevel) -> (Option<i64>, Option<&str>) {
        let (id, name) = match level {
            LocationLevel::Building => (self.building_id, self.building.as_deref()),
            LocationLevel::Floor => (self.floor_id, self.floor.as_deref()),
            LocationLevel::Room => (self.room_id, self.room.as_deref()),
            LocationLevel::Area => (self.area_id, self.area.as_deref()),
            LocationLevel::Element => (self.element_id, self.element.as_deref()),
        };
        (id, name.map(str::trim).filter(|s| !s.is_empty()))
    }

    /// True when no level carries any usable information.
    pub fn is_empty(&self) -> bool {
        LocationLevel::ALL
            .iter()
            .all(|&level| matches!(self.at(level), (None, None)))
    }
}

/// Resolve the five hierarchy levels top-down. Returns the normalized ids
/// plus the display names of the resolved records, or the first failure.
pub async fn resolve(
    store: &dyn Store,
    input: &LocationInput,
) -> Result<ResolvedLocation, ApiError> {
    // All five levels are mandatory; a request with no location at all is a
    // plain validation failure, not a resolver outcome.
    if input.is_empty() {
        return Err(ApiError::field_error("location", "This field is required"));
    }

    let mut parent: Option<i64> = None;
    let mut chain: Vec<LocationNode> = Vec::with_capacity(5);

    for level in LocationLevel::ALL {
        let node = match input.at(level) {
            (Some(id), _) => {
                let node = store
                    .location_by_id(level, id)
                    .await?
                    .ok_or_else(|| ApiError::location_resolution(level, id.to_string()))?;
                // A supplied id must chain onto the node resolved above it
                if node.parent_id != parent {
                    return Err(ApiError::location_resolution(level, id.to_string()));
                }
                node
            }
            (None, Some(name)) => store
                .location_by_name(level, parent, name)
                .await?
                .ok_or_else(|| ApiError::location_resolution(level, name))?,
            (None, None) => {
                return Err(ApiError::field_error(level.as_str(), "This field is required"));
            }
        };
        parent = Some(node.id);
        chain.push(node);
    }

    Ok(ResolvedLocation {
        building_id: chain[0].id,
        floor_id: chain[1].id,
        room_id: chain[2].id,
        area_id: chain[3].id,
        element_id: chain[4].id,
        building_name: chain[0].name.clone(),
        floor_name: chain[1].name.clone(),
        room_name: chain[2].name.clone(),
        area_name: chain[3].name.clone(),
        element_name: chain[4].name.clone(),
    })
}
