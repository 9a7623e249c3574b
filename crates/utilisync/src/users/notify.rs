//! Outbound user notifications.

use async_trait::async_trait;
use tracing::info;
use utilisync_core::DomainError;

use super::model::User;

/// Delivers account emails.
///
/// Implementations must not log or persist plain-text passwords.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// A new account was created with a temporary password.
    async fn new_user(&self, user: &User, password: &str) -> Result<(), DomainError>;

    /// A password reset was requested. `link_token` goes in the reset link.
    async fn reset_password(&self, user: &User, link_token: &str) -> Result<(), DomainError>;

    /// A reset completed and a new temporary password was issued.
    async fn new_password(&self, user: &User, password: &str) -> Result<(), DomainError>;
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn new_user(&self, _user: &User, _password: &str) -> Result<(), DomainError> {
        Ok(())
    }

    async fn reset_password(&self, _user: &User, _link_token: &str) -> Result<(), DomainError> {
        Ok(())
    }

    async fn new_password(&self, _user: &User, _password: &str) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Logs that a notification would be sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn new_user(&self, user: &User, _password: &str) -> Result<(), DomainError> {
        info!(user_id = %user.id, email = %user.email, name = %user.full_name(), "new user notification");
        Ok(())
    }

    async fn reset_password(&self, user: &User, _link_token: &str) -> Result<(), DomainError> {
        info!(user_id = %user.id, email = %user.email, "password reset notification");
        Ok(())
    }

    async fn new_password(&self, user: &User, _password: &str) -> Result<(), DomainError> {
        info!(user_id = %user.id, email = %user.email, "new password notification");
        Ok(())
    }
}
