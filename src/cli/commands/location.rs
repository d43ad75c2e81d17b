use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Deserialize;

use crate::database::models::{LocationLevel, LocationNode};
use crate::database::store::Store;

#[derive(Subcommand)]
pub enum LocationCommands {
    #[command(about = "Import a location tree from a JSON file")]
    Seed {
        #[arg(long)]
        file: PathBuf,
    },

    #[command(about = "List nodes at a level, optionally under a parent")]
    List {
        #[arg(long, help = "buildings|floors|rooms|areas|elements")]
        level: String,
        #[arg(long)]
        parent: Option<i64>,
    },
}

/// Seed file shape: buildings nesting floors, rooms, areas and elements.
/// Existing nodes (matched by scoped name) are reused, so seeding is
/// idempotent.
#[derive(Debug, Deserialize)]
struct SeedBuilding {
    name: String,
    #[serde(default)]
    floors: Vec<SeedFloor>,
}

#[derive(Debug, Deserialize)]
struct SeedFloor {
    name: String,
    #[serde(default)]
    rooms: Vec<SeedRoom>,
}

#[derive(Debug, Deserialize)]
struct SeedRoom {
    name: String,
    #[serde(default)]
    areas: Vec<SeedArea>,
}

#[derive(Debug, Deserialize)]
struct SeedArea {
    name: String,
    #[serde(default)]
    elements: Vec<SeedElement>,
}

#[derive(Debug, Deserialize)]
struct SeedElement {
    name: String,
}

async fn get_or_create(
    store: &dyn Store,
    level: LocationLevel,
    name: &str,
    parent_id: Option<i64>,
    created: &mut usize,
) -> Result<LocationNode> {
    if let Some(existing) = store.location_by_name(level, parent_id, name).await? {
        return Ok(existing);
    }
    let node = store
        .insert_location(level, name, parent_id)
        .await
        .with_context(|| format!("failed to create {} '{}'", level.as_str(), name))?;
    *created += 1;
    Ok(node)
}

pub async fn run(cmd: LocationCommands, store: &dyn Store) -> Result<()> {
    match cmd {
        LocationCommands::Seed { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let buildings: Vec<SeedBuilding> =
                serde_json::from_str(&raw).context("invalid seed file")?;

            let mut created = 0usize;
            for b in &buildings {
                let building =
                    get_or_create(store, LocationLevel::Building, &b.name, None, &mut created)
                        .await?;
                for f in &b.floors {
                    let floor = get_or_create(
                        store,
                        LocationLevel::Floor,
                        &f.name,
                        Some(building.id),
                        &mut created,
                    )
                    .await?;
                    for r in &f.rooms {
                        let room = get_or_create(
                            store,
                            LocationLevel::Room,
                            &r.name,
                            Some(floor.id),
                            &mut created,
                        )
                        .await?;
                        for a in &r.areas {
                            let area = get_or_create(
                                store,
                                LocationLevel::Area,
                                &a.name,
                                Some(room.id),
                                &mut created,
                            )
                            .await?;
                            for e in &a.elements {
                                get_or_create(
                                    store,
                                    LocationLevel::Element,
                                    &e.name,
                                    Some(area.id),
                                    &mut created,
                                )
                                .await?;
                            }
                        }
                    }
                }
            }
            println!("seeded {} new location nodes", created);
        }

        LocationCommands::List { level, parent } => {
            let Some(level) = LocationLevel::from_plural(&level) else {
                bail!("unknown level '{}' (expected buildings|floors|rooms|areas|elements)", level);
            };
            let nodes = store.locations_by_parent(level, parent).await?;
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
    }
    Ok(())
}
