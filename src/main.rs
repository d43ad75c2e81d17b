use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use helpdesk_api::auth::hash_password;
use helpdesk_api::config;
use helpdesk_api::database::models::{NewUser, Role};
use helpdesk_api::handlers;
use helpdesk_api::middleware;
use helpdesk_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Helpdesk API in {:?} mode", config.environment);

    // The store is chosen exactly once here; an unreachable backend is a
    // startup failure, not something to patch over per-request
    let state = match AppState::from_config().await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    bootstrap_admin(&state).await;

    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("HELPDESK_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("Helpdesk API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

/// Create the initial admin account when HELPDESK_ADMIN_PASSWORD is set and
/// no `admin` user exists yet. Fresh deployments have no other way to reach
/// the admin-only surfaces.
async fn bootstrap_admin(state: &AppState) {
    let Some(password) = std::env::var("HELPDESK_ADMIN_PASSWORD")
        .ok()
        .filter(|p| !p.is_empty())
    else {
        return;
    };

    match state.store.user_by_username("admin").await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let result = state
                .store
                .insert_user(NewUser {
                    username: "admin".to_string(),
                    password_hash: hash_password(&password),
                    full_name: "Administrator".to_string(),
                    email: "admin@localhost".to_string(),
                    role: Role::Admin,
                    department_id: None,
                })
                .await;
            match result {
                Ok(_) => tracing::info!("created bootstrap admin user"),
                Err(e) => tracing::error!("failed to create bootstrap admin: {}", e),
            }
        }
        Err(e) => tracing::error!("bootstrap admin lookup failed: {}", e),
    }
}

fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(ticket_routes())
        .merge(location_routes())
        .merge(user_routes())
        .route_layer(axum::middleware::from_fn(middleware::jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        // Global middleware
        .layer(DefaultBodyLimit::max(
            config::config().api.max_attachment_bytes + 64 * 1024,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::public::auth;

    Router::new()
        .route("/auth/login", post(auth::login_post))
        .route("/auth/register", post(auth::register_post))
}

fn auth_routes() -> Router<AppState> {
    use axum::routing::put;
    use handlers::protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/auth/password", put(auth::password_put))
}

fn ticket_routes() -> Router<AppState> {
    use handlers::protected::tickets;

    Router::new()
        // Collection operations
        .route(
            "/api/tickets",
            get(tickets::collection_get).post(tickets::collection_post),
        )
        // Record operations
        .route(
            "/api/tickets/:id",
            get(tickets::record_get)
                .patch(tickets::record_patch)
                .delete(tickets::record_delete),
        )
        .route(
            "/api/tickets/:id/comments",
            get(tickets::comments_get).post(tickets::comments_post),
        )
        .route(
            "/api/tickets/:id/attachments",
            get(tickets::attachments_get).post(tickets::attachments_post),
        )
        .route(
            "/api/tickets/:id/attachments/:aid",
            get(tickets::attachment_download),
        )
        .route("/api/tickets/:id/history", get(tickets::history_get))
}

fn location_routes() -> Router<AppState> {
    use handlers::protected::locations;

    Router::new().route(
        "/api/locations/:level",
        get(locations::level_get).post(locations::level_post),
    )
}

fn user_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::protected::users;

    Router::new()
        .route("/api/users", get(users::list_get).post(users::list_post))
        .route("/api/users/:id", axum::routing::patch(users::record_patch))
        .route(
            "/api/users/:id/password/reset",
            post(users::password_reset_post),
        )
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Helpdesk API",
            "version": version,
            "description": "Ticket tracking backend with location hierarchy and role-based triage",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/login, /auth/register (public - token acquisition)",
                "session": "/api/auth/* (protected)",
                "tickets": "/api/tickets[/:id] (protected)",
                "locations": "/api/locations/:level (protected)",
                "users": "/api/users[/:id] (protected, admin)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
