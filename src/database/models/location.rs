use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The five levels of the physical-location taxonomy, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "location_level", rename_all = "snake_case")]
pub enum LocationLevel {
    Building,
    Floor,
    Room,
    Area,
    Element,
}

impl LocationLevel {
    /// Levels in resolution order (parent before child).
    pub const ALL: [LocationLevel; 5] = [
        LocationLevel::Building,
        LocationLevel::Floor,
        LocationLevel::Room,
        LocationLevel::Area,
        LocationLevel::Element,
    ];

    /// The level immediately above, None for Building.
    pub fn parent(self) -> Option<LocationLevel> {
        match self {
            LocationLevel::Building => None,
            LocationLevel::Floor => Some(LocationLevel::Building),
            LocationLevel::Room => Some(LocationLevel::Floor),
            LocationLevel::Area => Some(LocationLevel::Room),
            LocationLevel::Element => Some(LocationLevel::Area),
        }
    }

    /// Field name used in payloads and error reporting.
    pub fn as_str(self) -> &'static str {
        match self {
            LocationLevel::Building => "building",
            LocationLevel::Floor => "floor",
            LocationLevel::Room => "room",
            LocationLevel::Area => "area",
            LocationLevel::Element => "element",
        }
    }

    /// Parse the plural path segment used by the lookup endpoints,
    /// e.g. `/api/locations/floors`.
    pub fn from_plural(segment: &str) -> Option<LocationLevel> {
        match segment {
            "buildings" => Some(LocationLevel::Building),
            "floors" => Some(LocationLevel::Floor),
            "rooms" => Some(LocationLevel::Room),
            "areas" => Some(LocationLevel::Area),
            "elements" => Some(LocationLevel::Element),
            _ => None,
        }
    }
}

/// One node of the location hierarchy. `parent_id` is None iff the node is a
/// Building; name uniqueness is scoped to the parent.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LocationNode {
    pub id: i64,
    pub level: LocationLevel,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Five resolved ids plus the display names carried onto the ticket record,
/// so reads never need a join to render the location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub building_id: i64,
    pub floor_id: i64,
    pub room_id: i64,
    pub area_id: i64,
    pub element_id: i64,
    pub building_name: String,
    pub floor_name: String,
    pub room_name: String,
    pub area_name: String,
    pub element_name: String,
}
