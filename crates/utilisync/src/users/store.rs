//! User persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use utilisync_core::DomainError;

use super::model::User;

/// Store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("user store unavailable")]
    Unavailable,

    /// Another user already has this email.
    #[error("duplicate email: {0}")]
    Duplicate(String),

    /// No user with this ID exists.
    #[error("user not found: {0}")]
    Missing(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        let base = match err {
            StoreError::Unavailable => DomainError::external("user store unavailable"),
            StoreError::Duplicate(_) => DomainError::conflict("email already in use"),
            StoreError::Missing(_) => DomainError::not_found("user not found"),
        };
        base.with_cause(message).with_origin("user-store")
    }
}

/// Which users to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFilter {
    /// Every user.
    #[default]
    All,
    /// Users who must change their password.
    MustChange,
}

impl ListFilter {
    /// Parses the `listType` request field. Empty means [`ListFilter::All`].
    ///
    /// # Errors
    ///
    /// Returns a bad request error for any other value.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.trim() {
            "" | "all" => Ok(Self::All),
            "mustChange" => Ok(Self::MustChange),
            other => Err(DomainError::bad_request(format!("unknown list type: {other}"))),
        }
    }

    fn matches(self, user: &User) -> bool {
        match self {
            Self::All => true,
            Self::MustChange => user.must_change,
        }
    }
}

/// Backing store for users.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Looks a user up by ID.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Looks a user up by lower-cased email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Looks a user up by outstanding reset token.
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new user. Emails are unique.
    async fn insert(&self, user: User) -> Result<(), StoreError>;

    /// Replaces an existing user.
    async fn update(&self, user: User) -> Result<(), StoreError>;

    /// Lists users, oldest first.
    async fn list(&self, filter: ListFilter) -> Result<Vec<User>, StoreError>;

    /// Records a login.
    async fn touch_last_activity(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Checks the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    offline: AtomicBool,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the connection. Every call fails while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users.read().values().find(|u| predicate(u)).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.online()?;
        Ok(self.users.read().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.online()?;
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.online()?;
        Ok(self.find(|u| u.reset_token.as_deref() == Some(token)))
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        self.online()?;
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(user.email));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn update(&self, user: User) -> Result<(), StoreError> {
        self.online()?;
        let mut users = self.users.write();
        if !users.contains_key(&user.id) {
            return Err(StoreError::Missing(user.id));
        }
        if users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Duplicate(user.email));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<User>, StoreError> {
        self.online()?;
        let mut users: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn touch_last_activity(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.online()?;
        match self.users.write().get_mut(id) {
            Some(user) => {
                user.last_activity = Some(at);
                Ok(())
            }
            None => Err(StoreError::Missing(id.to_string())),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utilisync_core::ErrorKind;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::new();
        let user = User::new("ada@example.com", "Ada", "Lovelace");
        store.insert(user.clone()).await.unwrap();

        assert_eq!(store.find_by_id(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            store.find_by_email("ada@example.com").await.unwrap(),
            Some(user)
        );
        assert_eq!(store.find_by_email("bob@example.com").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = InMemoryUserStore::new();
        store
            .insert(User::new("ada@example.com", "Ada", "Lovelace"))
            .await
            .unwrap();
        let err = store
            .insert(User::new("ada@example.com", "Ada", "King"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("ada@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = InMemoryUserStore::new();
        let user = User::new("ada@example.com", "Ada", "Lovelace");
        assert!(matches!(
            store.update(user).await,
            Err(StoreError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_update_cannot_steal_email() {
        let store = InMemoryUserStore::new();
        let ada = User::new("ada@example.com", "Ada", "Lovelace");
        let mut bob = User::new("bob@example.com", "Bob", "Babbage");
        store.insert(ada).await.unwrap();
        store.insert(bob.clone()).await.unwrap();

        bob.email = "ada@example.com".to_string();
        assert!(matches!(
            store.update(bob).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filter() {
        let store = InMemoryUserStore::new();
        let ada = User::new("ada@example.com", "Ada", "Lovelace");
        let mut bob = User::new("bob@example.com", "Bob", "Babbage");
        bob.must_change = true;
        store.insert(ada).await.unwrap();
        store.insert(bob).await.unwrap();

        assert_eq!(store.list(ListFilter::All).await.unwrap().len(), 2);
        let must_change = store.list(ListFilter::MustChange).await.unwrap();
        assert_eq!(must_change.len(), 1);
        assert_eq!(must_change[0].email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = InMemoryUserStore::new();
        store.set_offline(true);
        assert_eq!(store.ping().await, Err(StoreError::Unavailable));
        assert_eq!(
            store.find_by_id("x").await,
            Err(StoreError::Unavailable)
        );

        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_token_lookup_and_activity() {
        let store = InMemoryUserStore::new();
        let mut user = User::new("ada@example.com", "Ada", "Lovelace");
        user.reset_token = Some("token-1".to_string());
        store.insert(user.clone()).await.unwrap();

        let found = store.find_by_reset_token("token-1").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id.clone()));
        assert_eq!(store.find_by_reset_token("other").await.unwrap(), None);

        let now = Utc::now();
        store.touch_last_activity(&user.id, now).await.unwrap();
        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.last_activity, Some(now));
    }

    #[test]
    fn test_list_filter_parse() {
        assert_eq!(ListFilter::parse("").unwrap(), ListFilter::All);
        assert_eq!(ListFilter::parse("all").unwrap(), ListFilter::All);
        assert_eq!(ListFilter::parse("mustChange").unwrap(), ListFilter::MustChange);
        assert_eq!(
            ListFilter::parse("admins").unwrap_err().kind(),
            ErrorKind::BadRequest
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let err: DomainError = StoreError::Unavailable.into();
        assert_eq!(err.kind(), ErrorKind::External);
        let err: DomainError = StoreError::Missing("x".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
