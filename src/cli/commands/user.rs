use anyhow::{bail, Context, Result};
use clap::Subcommand;

use crate::auth;
use crate::database::models::{NewUser, Role, UserPatch};
use crate::database::store::Store;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user account")]
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        full_name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "user", help = "user|technician|manager|admin")]
        role: String,
        #[arg(long)]
        department: Option<i64>,
    },

    #[command(about = "Reset a password to a fresh temporary secret")]
    ResetPassword {
        #[arg(long)]
        username: String,
    },

    #[command(about = "List user accounts")]
    List,
}

fn parse_role(value: &str) -> Result<Role> {
    match value {
        "user" => Ok(Role::User),
        "technician" => Ok(Role::Technician),
        "manager" => Ok(Role::Manager),
        "admin" => Ok(Role::Admin),
        other => bail!("unknown role '{}' (expected user|technician|manager|admin)", other),
    }
}

pub async fn run(cmd: UserCommands, store: &dyn Store) -> Result<()> {
    match cmd {
        UserCommands::Create {
            username,
            password,
            full_name,
            email,
            role,
            department,
        } => {
            let role = parse_role(&role)?;
            let user = store
                .insert_user(NewUser {
                    username,
                    password_hash: auth::hash_password(&password),
                    full_name,
                    email,
                    role,
                    department_id: department,
                })
                .await
                .context("failed to create user")?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        UserCommands::ResetPassword { username } => {
            let user = store
                .user_by_username(&username)
                .await?
                .with_context(|| format!("no such user '{}'", username))?;
            let secret = auth::temp_secret();
            store
                .update_user(
                    user.id,
                    UserPatch {
                        password_hash: Some(auth::hash_password(&secret)),
                        ..Default::default()
                    },
                )
                .await
                .context("failed to update password")?;
            println!("temporary password for {}: {}", username, secret);
        }

        UserCommands::List => {
            let users = store.list_users().await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
    }
    Ok(())
}
