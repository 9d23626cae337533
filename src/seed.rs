use crate::auth;
use crate::error::Result;
use crate::users::{UserStore, ROLE_ADMIN, STATUS_ACTIVE};

pub const ADMIN_EMAIL: &str = "admin@local";
pub const ADMIN_PASSWORD: &str = "Admin123!";
pub const ADMIN_LOCALE: &str = "pt-BR";

/// Bootstraps the initial admin account. Returns true when the account was
/// created, false when it already existed.
pub async fn seed_admin(users: &UserStore) -> Result<bool> {
    if users.find_by_email(ADMIN_EMAIL).await?.is_some() {
        return Ok(false);
    }
    let password_hash = auth::hash_password(ADMIN_PASSWORD)?;
    users
        .create_user(
            ADMIN_EMAIL,
            &password_hash,
            ROLE_ADMIN,
            STATUS_ACTIVE,
            ADMIN_LOCALE,
        )
        .await?;
    Ok(true)
}
