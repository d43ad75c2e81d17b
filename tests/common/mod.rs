use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Password given to the bootstrap `admin` account of each spawned server.
pub const ADMIN_PASSWORD: &str = "bootstrap-admin-pw";

pub struct TestServer {
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary against the in-memory store so the
        // suite needs no external database; each server starts empty apart
        // from the bootstrap admin
        let mut cmd = Command::new("target/debug/helpdesk-api");
        cmd.env("HELPDESK_PORT", port.to_string())
            .env("HELPDESK_STORE", "memory")
            .env("HELPDESK_JWT_SECRET", "integration-test-secret")
            .env("HELPDESK_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawn a fresh server for a test scenario and wait until it is healthy.
pub async fn start_server() -> Result<TestServer> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

pub async fn login(
    client: &reqwest::Client,
    base: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let res = client
        .post(format!("{}/auth/login", base))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::OK,
        "login for '{}' failed: {}",
        username,
        res.status()
    );
    let body: Value = res.json().await?;
    Ok(body["data"]["token"]
        .as_str()
        .context("missing token in login response")?
        .to_string())
}

pub async fn admin_login(client: &reqwest::Client, base: &str) -> Result<String> {
    login(client, base, "admin", ADMIN_PASSWORD).await
}

pub async fn register(
    client: &reqwest::Client,
    base: &str,
    username: &str,
    password: &str,
) -> Result<i64> {
    let res = client
        .post(format!("{}/auth/register", base))
        .json(&json!({
            "username": username,
            "password": password,
            "full_name": username,
            "email": format!("{}@example.com", username),
        }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "register '{}' failed: {}",
        username,
        res.status()
    );
    let body: Value = res.json().await?;
    body["data"]["id"].as_i64().context("missing user id")
}

/// Admin-create an account with an explicit role; returns the user id.
pub async fn create_staff(
    client: &reqwest::Client,
    base: &str,
    admin_token: &str,
    username: &str,
    password: &str,
    role: &str,
) -> Result<i64> {
    let res = client
        .post(format!("{}/api/users", base))
        .bearer_auth(admin_token)
        .json(&json!({
            "username": username,
            "password": password,
            "full_name": username,
            "email": format!("{}@example.com", username),
            "role": role,
        }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "create '{}' failed: {}",
        username,
        res.status()
    );
    let body: Value = res.json().await?;
    body["data"]["id"].as_i64().context("missing user id")
}

async fn create_location(
    client: &reqwest::Client,
    base: &str,
    admin_token: &str,
    level: &str,
    name: &str,
    parent_id: Option<i64>,
) -> Result<i64> {
    let res = client
        .post(format!("{}/api/locations/{}", base, level))
        .bearer_auth(admin_token)
        .json(&json!({ "name": name, "parent_id": parent_id }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "create {} '{}' failed: {}",
        level,
        name,
        res.status()
    );
    let body: Value = res.json().await?;
    body["data"]["id"].as_i64().context("missing location id")
}

/// Seed the canonical test chain:
/// Building A / 1st Floor / 101 - Office / Elektroinstalace / Osvětlení
pub async fn seed_locations(
    client: &reqwest::Client,
    base: &str,
    admin_token: &str,
) -> Result<i64> {
    let building = create_location(client, base, admin_token, "buildings", "Building A", None).await?;
    let floor =
        create_location(client, base, admin_token, "floors", "1st Floor", Some(building)).await?;
    let room =
        create_location(client, base, admin_token, "rooms", "101 - Office", Some(floor)).await?;
    let area =
        create_location(client, base, admin_token, "areas", "Elektroinstalace", Some(room)).await?;
    create_location(client, base, admin_token, "elements", "Osvětlení", Some(area)).await?;
    Ok(building)
}
