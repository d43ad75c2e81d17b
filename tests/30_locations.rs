mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn cascading_dropdown_lookups() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    let building = common::seed_locations(&client, &server.base_url, &admin_token).await?;

    let res = client
        .get(format!("{}/api/locations/buildings", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let buildings = body["data"].as_array().unwrap();
    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0]["name"], "Building A");

    let res = client
        .get(format!(
            "{}/api/locations/floors?parent={}",
            server.base_url, building
        ))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let floors = body["data"].as_array().unwrap();
    assert_eq!(floors.len(), 1);
    assert_eq!(floors[0]["name"], "1st Floor");
    assert_eq!(floors[0]["parent_id"].as_i64(), Some(building));

    // non-building levels require a parent to scope the lookup
    let res = client
        .get(format!("{}/api/locations/floors", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // unknown level segment
    let res = client
        .get(format!("{}/api/locations/wings", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn sibling_names_are_scoped_to_parent() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    let building_a = common::seed_locations(&client, &server.base_url, &admin_token).await?;

    // duplicate floor under the same building conflicts
    let res = client
        .post(format!("{}/api/locations/floors", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "1st Floor", "parent_id": building_a }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // the same floor name under a different building is a different node
    let res = client
        .post(format!("{}/api/locations/buildings", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Building B", "parent_id": null }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    let building_b = body["data"]["id"].as_i64().unwrap();

    let res = client
        .post(format!("{}/api/locations/floors", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "1st Floor", "parent_id": building_b }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn location_administration_is_admin_only() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;

    let res = client
        .post(format!("{}/api/locations/buildings", server.base_url))
        .bearer_auth(&alice_token)
        .json(&json!({ "name": "Rogue Building" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn orphan_parent_reference_is_rejected() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;

    // floor without any parent
    let res = client
        .post(format!("{}/api/locations/floors", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Floating Floor" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // floor under a parent that does not exist
    let res = client
        .post(format!("{}/api/locations/floors", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Floating Floor", "parent_id": 4242 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn ticket_creation_reports_the_failing_level() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;
    common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;

    // the building resolves, the floor does not exist under it
    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&alice_token)
        .json(&json!({
            "title": "Broken window",
            "description": "Second floor window cracked",
            "category": "maintenance",
            "priority": "low",
            "location": {
                "building": "Building A",
                "floor": "9th Floor",
                "room": "101 - Office",
                "area": "Elektroinstalace",
                "element": "Osvětlení"
            }
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "LOCATION_RESOLUTION_ERROR");
    assert!(body["field_errors"]["floor"].is_string());
    assert!(body["field_errors"].get("building").is_none());
    Ok(())
}

#[tokio::test]
async fn missing_location_is_a_validation_error() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;
    common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&alice_token)
        .json(&json!({
            "title": "No location given",
            "description": "This should be rejected before resolution",
            "category": "it",
            "priority": "low",
            "location": {}
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}
