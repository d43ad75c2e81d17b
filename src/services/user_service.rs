use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::{self, Claims};
use crate::config;
use crate::database::models::{NewUser, Role, User, UserPatch};
use crate::database::store::Store;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::policy;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminCreateUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "crate::policy::double_option")]
    pub department_id: Option<Option<i64>>,
    pub active: Option<bool>,
}

/// Account and session workflows. Password hashing lives in the auth
/// module; this layer only ever handles stored hashes and match results.
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Self-registration always yields the `user` role.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, ApiError> {
        validate_credentials(&req.username, &req.password)?;
        if !req.email.contains('@') {
            return Err(ApiError::field_error("email", "Invalid email address"));
        }
        let user = self
            .store
            .insert_user(NewUser {
                username: req.username,
                password_hash: auth::hash_password(&req.password),
                full_name: req.full_name,
                email: req.email,
                role: Role::User,
                department_id: None,
            })
            .await?;
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ApiError> {
        let user = self
            .store
            .user_by_username(&req.username)
            .await?
            .ok_or_else(|| ApiError::unauthorized("invalid username or password"))?;

        if !auth::verify_password(&req.password, &user.password_hash) {
            return Err(ApiError::unauthorized("invalid username or password"));
        }
        if !user.active {
            return Err(ApiError::unauthorized("account is deactivated"));
        }

        let claims = Claims::new(user.username.clone(), user.id, user.role, user.department_id);
        let token = auth::generate_jwt(claims).map_err(|e| {
            tracing::error!("JWT generation failed: {}", e);
            ApiError::internal_server_error("failed to issue token")
        })?;

        Ok(LoginResponse {
            token,
            user,
            expires_in: config::config().security.jwt_expiry_hours * 3600,
        })
    }

    pub async fn whoami(&self, actor: &AuthUser) -> Result<User, ApiError> {
        self.store
            .user_by_id(actor.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("user no longer exists"))
    }

    pub async fn change_password(
        &self,
        actor: &AuthUser,
        req: ChangePasswordRequest,
    ) -> Result<(), ApiError> {
        let user = self.whoami(actor).await?;
        if !auth::verify_password(&req.current_password, &user.password_hash) {
            return Err(ApiError::unauthorized("current password does not match"));
        }
        validate_credentials(&user.username, &req.new_password)?;
        self.store
            .update_user(
                user.id,
                UserPatch {
                    password_hash: Some(auth::hash_password(&req.new_password)),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Admin reset: generates an opaque temporary secret, stores its hash
    /// and returns it exactly once for out-of-band delivery.
    pub async fn admin_reset_password(
        &self,
        actor: &AuthUser,
        user_id: i64,
    ) -> Result<String, ApiError> {
        policy::authorize_admin(actor)?;
        let secret = auth::temp_secret();
        self.store
            .update_user(
                user_id,
                UserPatch {
                    password_hash: Some(auth::hash_password(&secret)),
                    ..Default::default()
                },
            )
            .await?;
        Ok(secret)
    }

    pub async fn admin_list(&self, actor: &AuthUser) -> Result<Vec<User>, ApiError> {
        policy::authorize_admin(actor)?;
        Ok(self.store.list_users().await?)
    }

    pub async fn admin_create(
        &self,
        actor: &AuthUser,
        req: AdminCreateUser,
    ) -> Result<User, ApiError> {
        policy::authorize_admin(actor)?;
        validate_credentials(&req.username, &req.password)?;
        let user = self
            .store
            .insert_user(NewUser {
                username: req.username,
                password_hash: auth::hash_password(&req.password),
                full_name: req.full_name,
                email: req.email,
                role: req.role,
                department_id: req.department_id,
            })
            .await?;
        Ok(user)
    }

    pub async fn admin_update(
        &self,
        actor: &AuthUser,
        user_id: i64,
        req: AdminUpdateUser,
    ) -> Result<User, ApiError> {
        policy::authorize_admin(actor)?;
        let user = self
            .store
            .update_user(
                user_id,
                UserPatch {
                    full_name: req.full_name,
                    email: req.email,
                    role: req.role,
                    department_id: req.department_id,
                    active: req.active,
                    password_hash: None,
                },
            )
            .await?;
        Ok(user)
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if username.trim().len() < 3 {
        return Err(ApiError::field_error(
            "username",
            "must be at least 3 characters",
        ));
    }
    if password.len() < 8 {
        return Err(ApiError::field_error(
            "password",
            "must be at least 8 characters",
        ));
    }
    Ok(())
}
