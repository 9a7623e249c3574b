//! User account operations.
//!
//! Each method backs one `/users/*` route. Callers of the token-protected
//! operations must resolve to a stored user; anything else is forbidden.

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use utilisync_core::{DomainError, DomainResult, RequestContext};

use super::model::User;
use super::notify::Notifier;
use super::pages::ResetPage;
use super::store::{ListFilter, StoreError, UserStore};
use crate::password::{random_token, verify_password, PasswordGenerator, DEFAULT_TOKEN_LENGTH};
use crate::token::JwtTokens;

/// Default lifetime of a password reset link.
pub const DEFAULT_RESET_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const EMAIL_IN_USE: &str = "email already in use on this platform, choose a different email";
const PASSWORD_MISMATCH: &str = "invalid password - password did not match";

/// `/users/create` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    /// Login email.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// `/users/create` response.
#[derive(Debug, Clone, Serialize)]
pub struct NewUserResponse {
    /// The created (or existing) user.
    pub user: User,
}

/// `/users/get` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetUserRequest {
    /// User to fetch.
    pub id: String,
}

/// `/users/get` response.
#[derive(Debug, Clone, Serialize)]
pub struct GetUserResponse {
    /// The requested user.
    pub user: User,
}

/// `/users/login` body.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// `/users/login` response.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent calls.
    pub token: String,
}

/// `/users/put` body. Empty fields are left unchanged.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct PutUserRequest {
    /// User to change.
    pub id: String,
    /// New email.
    pub email: String,
    /// New given name.
    #[serde(rename = "firstname")]
    pub first_name: String,
    /// New family name.
    #[serde(rename = "lastname")]
    pub last_name: String,
    /// Current password, required with `newpassword`.
    #[serde(rename = "oldpassword")]
    pub old_password: String,
    /// Replacement password.
    #[serde(rename = "newpassword")]
    pub new_password: String,
}

impl std::fmt::Debug for PutUserRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutUserRequest")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

/// `/users/requestpasswordreset` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordResetRequest {
    /// Account email.
    pub email: String,
}

/// `/users/listusers` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListUsersRequest {
    /// `all` (or empty) or `mustChange`.
    pub list_type: String,
}

/// `/users/listusers` response.
#[derive(Debug, Clone, Serialize)]
pub struct ListUsersResponse {
    /// Matching users.
    #[serde(rename = "Users")]
    pub users: Vec<User>,
}

/// User account service.
pub struct UserService {
    store: Arc<dyn UserStore>,
    tokens: Arc<JwtTokens>,
    notifier: Arc<dyn Notifier>,
    passwords: Arc<dyn PasswordGenerator>,
    reset_ttl: Duration,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("reset_ttl", &self.reset_ttl)
            .finish_non_exhaustive()
    }
}

impl UserService {
    /// Creates the service.
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: Arc<JwtTokens>,
        notifier: Arc<dyn Notifier>,
        passwords: Arc<dyn PasswordGenerator>,
    ) -> Self {
        Self {
            store,
            tokens,
            notifier,
            passwords,
            reset_ttl: DEFAULT_RESET_TOKEN_TTL,
        }
    }

    /// Overrides the reset link lifetime.
    #[must_use]
    pub fn with_reset_ttl(mut self, ttl: Duration) -> Self {
        self.reset_ttl = ttl;
        self
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.store)
    }

    /// Creates an account, or returns the existing one for that email.
    ///
    /// # Errors
    ///
    /// Bad request when a field is missing; internal when the store fails.
    pub async fn create_new_user(
        &self,
        ctx: &RequestContext,
        req: CreateUserRequest,
    ) -> DomainResult<NewUserResponse> {
        if req.email.trim().is_empty() {
            return Err(DomainError::bad_request("email is required"));
        }

        let user = self
            .find_or_create(ctx, &req.email, &req.first_name, &req.last_name)
            .await
            .map_err(|e| match e.kind() {
                utilisync_core::ErrorKind::BadRequest => e,
                _ => DomainError::internal("user service failed to create new user").with_cause(e),
            })?;

        Ok(NewUserResponse { user })
    }

    /// Returns the user with `email`, creating it with a temporary password
    /// when there is none.
    ///
    /// # Errors
    ///
    /// Bad request when a field is missing or the email was taken
    /// concurrently; the store's error otherwise.
    pub async fn find_or_create(
        &self,
        _ctx: &RequestContext,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> DomainResult<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(DomainError::bad_request("email is required"));
        }

        if let Some(existing) = self.store.find_by_email(&email).await? {
            return Ok(existing);
        }

        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(DomainError::bad_request("first and last name are required"));
        }

        let mut user = User::new(&email, first_name, last_name);
        let password = self.passwords.generate().map_err(|e| {
            DomainError::internal("failed to generate temporary password").with_cause(e)
        })?;
        user.password_hash = password.hash;

        match self.store.insert(user.clone()).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(DomainError::bad_request(EMAIL_IN_USE));
            }
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, email = %user.email, "created new user");
        if let Err(e) = self.notifier.new_user(&user, &password.plain).await {
            warn!(user_id = %user.id, error = %e, "new user notification failed");
        }

        Ok(user)
    }

    /// Fetches a user by ID.
    ///
    /// # Errors
    ///
    /// Forbidden for an unknown caller, bad request without an ID, not
    /// found for an unknown ID.
    pub async fn get(&self, ctx: &RequestContext, req: GetUserRequest) -> DomainResult<GetUserResponse> {
        self.validate_user_auth(ctx).await?;

        if req.id.is_empty() {
            return Err(DomainError::bad_request("id is required"));
        }

        let user = self
            .store
            .find_by_id(&req.id)
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;

        Ok(GetUserResponse { user })
    }

    /// Checks credentials and issues a token.
    ///
    /// # Errors
    ///
    /// Bad request for missing fields or a wrong email/password pair.
    pub async fn login(&self, _ctx: &RequestContext, req: LoginRequest) -> DomainResult<LoginResponse> {
        if req.email.is_empty() {
            return Err(DomainError::bad_request("email is required"));
        }
        if req.password.is_empty() {
            return Err(DomainError::bad_request("password is required"));
        }

        let email = req.email.trim().to_lowercase();
        let Some(user) = self.store.find_by_email(&email).await? else {
            info!(email = %email, "login failed");
            return Err(DomainError::bad_request(PASSWORD_MISMATCH).with_cause("unknown email"));
        };

        match verify_password(&req.password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                info!(email = %email, "login failed");
                return Err(DomainError::bad_request(PASSWORD_MISMATCH));
            }
            Err(e) => {
                return Err(DomainError::internal("error comparing password").with_cause(e));
            }
        }

        if let Err(e) = self.store.touch_last_activity(&user.id, Utc::now()).await {
            warn!(email = %email, error = %e, "failed to update last activity");
        }

        let token = self.tokens.issue(&user.id, None).map_err(|e| {
            DomainError::internal("user service failed to issue valid token").with_cause(e)
        })?;

        info!(user_id = %user.id, "login succeeded");
        Ok(LoginResponse { token })
    }

    /// Updates profile fields, email and password.
    ///
    /// # Errors
    ///
    /// Forbidden for an unknown caller; bad request for a missing ID, an
    /// email owned by someone else or a wrong old password; not found for
    /// an unknown ID.
    pub async fn put(&self, ctx: &RequestContext, req: PutUserRequest) -> DomainResult<()> {
        self.validate_user_auth(ctx).await?;

        if req.id.is_empty() {
            return Err(DomainError::bad_request("id is required"));
        }

        let mut user = self
            .store
            .find_by_id(&req.id)
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;

        let email = req.email.trim().to_lowercase();
        if !email.is_empty() && email != user.email {
            if let Some(existing) = self.store.find_by_email(&email).await? {
                if existing.id != user.id {
                    return Err(DomainError::bad_request(EMAIL_IN_USE));
                }
            }
            user.email = email;
        }

        if !req.new_password.is_empty() {
            if req.old_password.is_empty() {
                return Err(DomainError::bad_request(
                    "old password is required in order to change password",
                ));
            }
            match verify_password(&req.old_password, &user.password_hash) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(DomainError::bad_request(
                        "old password was not correct - try again",
                    ))
                }
                Err(e) => {
                    return Err(DomainError::internal("failed to verify old password - try again")
                        .with_cause(e))
                }
            }
            user.password_hash = self
                .passwords
                .hash(&req.new_password)
                .map_err(|e| DomainError::internal("failed to hash new password").with_cause(e))?;
            user.must_change = false;
        }

        if !req.first_name.is_empty() {
            user.first_name = req.first_name;
        }
        if !req.last_name.is_empty() {
            user.last_name = req.last_name;
        }

        user.touch();
        let id = user.id.clone();
        let email = user.email.clone();
        self.store.update(user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => DomainError::bad_request(EMAIL_IN_USE),
            other => other.into(),
        })?;

        info!(user_id = %id, email = %email, "updated user");
        Ok(())
    }

    /// Starts a password reset by mailing a one-time link.
    ///
    /// # Errors
    ///
    /// Bad request without an email, not found for an unknown email.
    pub async fn request_password_reset(
        &self,
        _ctx: &RequestContext,
        req: PasswordResetRequest,
    ) -> DomainResult<()> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(DomainError::bad_request("email is required"));
        }

        let mut user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;

        let token = random_token(DEFAULT_TOKEN_LENGTH);
        let ttl = ChronoDuration::from_std(self.reset_ttl)
            .map_err(|e| DomainError::internal("invalid reset token lifetime").with_cause(e))?;
        user.reset_token = Some(token.clone());
        user.reset_token_expires = Some(Utc::now() + ttl);
        user.touch();
        self.store.update(user.clone()).await?;

        info!(user_id = %user.id, email = %user.email, "password reset requested");
        if let Err(e) = self.notifier.reset_password(&user, &token).await {
            warn!(user_id = %user.id, error = %e, "password reset notification failed");
        }
        Ok(())
    }

    /// Completes a reset using the confirmation token from the link.
    ///
    /// # Errors
    ///
    /// Bad request for an unknown or expired token.
    pub async fn reset_password(&self, ctx: &RequestContext) -> DomainResult<ResetPage> {
        let token = ctx.confirmation_token();

        let mut user = self
            .store
            .find_by_reset_token(token)
            .await?
            .ok_or_else(|| DomainError::bad_request("reset token invalid, user not found"))?;

        if !user.reset_token_valid(Utc::now()) {
            return Err(DomainError::bad_request("reset token expired"));
        }

        let password = self.passwords.generate().map_err(|e| {
            DomainError::internal("failed to generate temporary password").with_cause(e)
        })?;
        user.password_hash = password.hash;
        user.must_change = true;
        user.reset_token = None;
        user.reset_token_expires = None;
        user.touch();
        self.store.update(user.clone()).await?;

        info!(user_id = %user.id, email = %user.email, "reset password for user");
        if let Err(e) = self.notifier.new_password(&user, &password.plain).await {
            warn!(user_id = %user.id, error = %e, "new password notification failed");
        }
        Ok(ResetPage)
    }

    /// Lists users.
    ///
    /// # Errors
    ///
    /// Forbidden for an unknown caller, bad request for an unknown list type.
    pub async fn list_users(
        &self,
        ctx: &RequestContext,
        req: ListUsersRequest,
    ) -> DomainResult<ListUsersResponse> {
        self.validate_user_auth(ctx).await?;
        let filter = ListFilter::parse(&req.list_type)?;
        let users = self.store.list(filter).await?;
        Ok(ListUsersResponse { users })
    }

    /// Checks the authenticated caller still exists.
    ///
    /// # Errors
    ///
    /// Forbidden when it does not or cannot be checked.
    pub async fn validate_user_auth(&self, ctx: &RequestContext) -> DomainResult<()> {
        let forbidden = || DomainError::forbidden("user not allowed to perform this action");

        let key = ctx.user_key();
        if key.is_empty() {
            return Err(forbidden().with_cause("user not valid"));
        }
        match self.store.find_by_id(key).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(forbidden().with_cause("user not valid")),
            Err(e) => Err(forbidden().with_cause(e)),
        }
    }
}
