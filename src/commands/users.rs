//! User and session management commands

use chrono::Duration;
use colored::Colorize;

use crate::auth::issue_session;
use crate::cli::{SessionCommand, UserCommand};
use crate::config::Config;
use crate::error::{QuireError, Result};
use crate::storage::Store;

use super::serve::open_store;

/// Handle `quire users`
///
/// # Errors
///
/// Returns error if the email is empty, already registered, or the store fails
pub fn handle_users(config: &Config, command: UserCommand) -> Result<()> {
    let store = open_store(config)?;
    match command {
        UserCommand::Create { email } => {
            let user = create_user(&*store, &email)?;
            println!("{} {} ({})", "Created user".green(), user.email, user.id.cyan());
        }
    }
    Ok(())
}

/// Create a user, rejecting empty and duplicate emails
///
/// # Errors
///
/// Returns `QuireError::Config` for invalid input, or a storage error
pub fn create_user(store: &dyn Store, email: &str) -> Result<crate::storage::User> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(QuireError::Config(format!("Invalid email: {:?}", email)).into());
    }
    if store.get_user_by_email(email)?.is_some() {
        return Err(QuireError::Config(format!("User {} already exists", email)).into());
    }
    store.create_user(email)
}

/// Handle `quire sessions`
///
/// # Errors
///
/// Returns error if the user does not exist or the store fails
pub fn handle_sessions(config: &Config, command: SessionCommand) -> Result<()> {
    let store = open_store(config)?;
    match command {
        SessionCommand::Issue { email, ttl_hours } => {
            let hours = ttl_hours.unwrap_or(config.auth.session_ttl_hours);
            let token = issue_for_email(&*store, &email, hours)?;
            println!("{}", token);
            eprintln!(
                "{}",
                format!("Session for {} valid for {} hours", email, hours).dimmed()
            );
        }
    }
    Ok(())
}

/// Issue a session token for the user with `email`
///
/// # Errors
///
/// Returns `QuireError::Authentication` if the user is unknown or the
/// lifetime is not positive
pub fn issue_for_email(store: &dyn Store, email: &str, ttl_hours: i64) -> Result<String> {
    if ttl_hours <= 0 {
        return Err(QuireError::Authentication("ttl must be positive".to_string()).into());
    }
    let user = store
        .get_user_by_email(email)?
        .ok_or_else(|| QuireError::Authentication(format!("No user with email {}", email)))?;
    issue_session(store, &user.id, Duration::hours(ttl_hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_token;
    use crate::storage::SqliteStorage;
    use chrono::Utc;
    use tempfile::TempDir;

    fn store() -> (SqliteStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStorage::new_with_path(dir.path().join("quire.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_create_user_rejects_duplicates() {
        let (store, _dir) = store();
        create_user(&store, "ada@example.com").unwrap();
        assert!(create_user(&store, "ada@example.com").is_err());
        assert!(create_user(&store, "not-an-email").is_err());
    }

    #[test]
    fn test_issue_for_email_resolves() {
        let (store, _dir) = store();
        let user = create_user(&store, "ada@example.com").unwrap();

        let token = issue_for_email(&store, "ada@example.com", 1).unwrap();
        let resolved = store
            .get_session_user(&hash_token(&token), Utc::now())
            .unwrap();
        assert_eq!(resolved, Some(user.id));
    }

    #[test]
    fn test_issue_for_unknown_email_fails() {
        let (store, _dir) = store();
        assert!(issue_for_email(&store, "ghost@example.com", 1).is_err());
    }
}
