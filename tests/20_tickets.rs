mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn ticket_payload() -> Value {
    json!({
        "title": "Nefunkční osvětlení",
        "description": "Světlo v kanceláři 101 nesvítí",
        "category": "maintenance",
        "priority": "high",
        "location": {
            "building": "Building A",
            "floor": "1st Floor",
            "room": "101 - Office",
            "area": "Elektroinstalace",
            "element": "Osvětlení"
        }
    })
}

async fn list_ids(client: &reqwest::Client, base: &str, token: &str) -> Result<Vec<i64>> {
    let res = client
        .get(format!("{}/api/tickets", base))
        .bearer_auth(token)
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "list failed: {}", res.status());
    let body: Value = res.json().await?;
    Ok(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_i64())
        .collect())
}

async fn patch_status(
    client: &reqwest::Client,
    base: &str,
    token: &str,
    ticket_id: i64,
    status: &str,
) -> Result<reqwest::Response> {
    Ok(client
        .patch(format!("{}/api/tickets/{}", base, ticket_id))
        .bearer_auth(token)
        .json(&json!({ "status": status }))
        .send()
        .await?)
}

#[tokio::test]
async fn submitter_creates_ticket_with_resolved_location() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;
    let alice = common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;

    // submitter-supplied status/assignee must be ignored
    let mut payload = ticket_payload();
    payload["status"] = json!("assigned");

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&alice_token)
        .json(&payload)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: Value = res.json().await?;
    let ticket = &body["data"];
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["created_by"].as_i64(), Some(alice));
    assert_eq!(ticket["building_name"], "Building A");
    assert_eq!(ticket["element_name"], "Osvětlení");
    // all five normalized references are present
    for field in ["building_id", "floor_id", "room_id", "area_id", "element_id"] {
        assert!(ticket[field].as_i64().unwrap() > 0, "missing {}", field);
    }
    Ok(())
}

#[tokio::test]
async fn visibility_follows_roles() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;

    common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    common::register(&client, &server.base_url, "bob", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;
    let bob_token = common::login(&client, &server.base_url, "bob", "correct-horse").await?;

    let tech = common::create_staff(
        &client,
        &server.base_url,
        &admin_token,
        "tina",
        "tech-password",
        "technician",
    )
    .await?;
    let tech_token = common::login(&client, &server.base_url, "tina", "tech-password").await?;

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&alice_token)
        .json(&ticket_payload())
        .send()
        .await?;
    let body: Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_i64().unwrap();

    // creator and admin see it; another submitter does not; the technician
    // sees it while it sits in the unassigned pool
    assert!(list_ids(&client, &server.base_url, &alice_token).await?.contains(&ticket_id));
    assert!(list_ids(&client, &server.base_url, &admin_token).await?.contains(&ticket_id));
    assert!(!list_ids(&client, &server.base_url, &bob_token).await?.contains(&ticket_id));
    assert!(list_ids(&client, &server.base_url, &tech_token).await?.contains(&ticket_id));

    // direct read by the other submitter is forbidden
    let res = client
        .get(format!("{}/api/tickets/{}", server.base_url, ticket_id))
        .bearer_auth(&bob_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // once assigned elsewhere the ticket leaves the technician pool
    let other = common::create_staff(
        &client,
        &server.base_url,
        &admin_token,
        "tom",
        "tech-password",
        "technician",
    )
    .await?;
    let res = client
        .patch(format!("{}/api/tickets/{}", server.base_url, ticket_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "status": "assigned", "assignee_id": other }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!list_ids(&client, &server.base_url, &tech_token).await?.contains(&ticket_id));
    let _ = tech;
    Ok(())
}

#[tokio::test]
async fn assignment_gates_technician_updates() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;
    common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;

    let tina = common::create_staff(
        &client,
        &server.base_url,
        &admin_token,
        "tina",
        "tech-password",
        "technician",
    )
    .await?;
    common::create_staff(
        &client,
        &server.base_url,
        &admin_token,
        "uli",
        "tech-password",
        "technician",
    )
    .await?;
    let tina_token = common::login(&client, &server.base_url, "tina", "tech-password").await?;
    let uli_token = common::login(&client, &server.base_url, "uli", "tech-password").await?;

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&alice_token)
        .json(&ticket_payload())
        .send()
        .await?;
    let body: Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_i64().unwrap();

    // admin triages to tina
    let res = client
        .patch(format!("{}/api/tickets/{}", server.base_url, ticket_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "status": "assigned", "assignee_id": tina }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // the assignee may move it along; the other technician may not
    let res = patch_status(&client, &server.base_url, &tina_token, ticket_id, "in_progress").await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = patch_status(&client, &server.base_url, &uli_token, ticket_id, "on_hold").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert!(body["message"].as_str().unwrap().contains("assigned"));

    // the submitter may not touch triage fields at all
    let res = patch_status(&client, &server.base_url, &alice_token, ticket_id, "resolved").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn resolved_and_closed_stamps_are_once_only() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&admin_token)
        .json(&ticket_payload())
        .send()
        .await?;
    let body: Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_i64().unwrap();

    // admin may force the transition directly
    let res = patch_status(&client, &server.base_url, &admin_token, ticket_id, "resolved").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let first_stamp = body["data"]["resolved_at"].as_str().unwrap().to_string();

    // re-sending the same status must not move the stamp
    let res = patch_status(&client, &server.base_url, &admin_token, ticket_id, "resolved").await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["resolved_at"].as_str().unwrap(), first_stamp);

    let res = patch_status(&client, &server.base_url, &admin_token, ticket_id, "closed").await?;
    let body: Value = res.json().await?;
    assert!(body["data"]["closed_at"].is_string());
    assert_eq!(body["data"]["resolved_at"].as_str().unwrap(), first_stamp);
    Ok(())
}

#[tokio::test]
async fn invalid_transition_is_rejected_for_non_admins() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;
    common::create_staff(
        &client,
        &server.base_url,
        &admin_token,
        "mona",
        "mgr-password",
        "manager",
    )
    .await?;
    let mona_token = common::login(&client, &server.base_url, "mona", "mgr-password").await?;

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&mona_token)
        .json(&ticket_payload())
        .send()
        .await?;
    let body: Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_i64().unwrap();

    // Open -> Closed skips the pipeline
    let res = patch_status(&client, &server.base_url, &mona_token, ticket_id, "closed").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(body["field_errors"]["status"].is_string());
    Ok(())
}

#[tokio::test]
async fn comments_attachments_history_and_cascade_delete() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let admin_token = common::admin_login(&client, &server.base_url).await?;
    common::seed_locations(&client, &server.base_url, &admin_token).await?;
    common::register(&client, &server.base_url, "alice", "correct-horse").await?;
    let alice_token = common::login(&client, &server.base_url, "alice", "correct-horse").await?;

    let res = client
        .post(format!("{}/api/tickets", server.base_url))
        .bearer_auth(&alice_token)
        .json(&ticket_payload())
        .send()
        .await?;
    let body: Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_i64().unwrap();

    // comment
    let res = client
        .post(format!("{}/api/tickets/{}/comments", server.base_url, ticket_id))
        .bearer_auth(&alice_token)
        .json(&json!({ "body": "Prosím o rychlou opravu" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // attachment upload and download round trip
    let content = b"fake jpeg bytes".to_vec();
    let res = client
        .post(format!(
            "{}/api/tickets/{}/attachments?filename=photo.jpg",
            server.base_url, ticket_id
        ))
        .bearer_auth(&alice_token)
        .header("content-type", "image/jpeg")
        .body(content.clone())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    let attachment_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["size_bytes"].as_i64(), Some(content.len() as i64));

    let res = client
        .get(format!(
            "{}/api/tickets/{}/attachments/{}",
            server.base_url, ticket_id, attachment_id
        ))
        .bearer_auth(&alice_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap().to_str()?,
        "image/jpeg"
    );
    assert_eq!(res.bytes().await?.to_vec(), content);

    // a status change leaves a history row
    let res = patch_status(&client, &server.base_url, &admin_token, ticket_id, "assigned").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = client
        .get(format!("{}/api/tickets/{}/history", server.base_url, ticket_id))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let entries = body["data"].as_array().unwrap();
    assert!(entries.iter().any(|e| e["field"] == "status"
        && e["old_value"] == "open"
        && e["new_value"] == "assigned"));

    // non-admin delete is forbidden, admin delete cascades
    let res = client
        .delete(format!("{}/api/tickets/{}", server.base_url, ticket_id))
        .bearer_auth(&alice_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(format!("{}/api/tickets/{}", server.base_url, ticket_id))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    for path in [
        format!("/api/tickets/{}", ticket_id),
        format!("/api/tickets/{}/comments", ticket_id),
        format!("/api/tickets/{}/attachments", ticket_id),
        format!("/api/tickets/{}/history", ticket_id),
    ] {
        let res = client
            .get(format!("{}{}", server.base_url, path))
            .bearer_auth(&admin_token)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "path {}", path);
    }
    Ok(())
}
