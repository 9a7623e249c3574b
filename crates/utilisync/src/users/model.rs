//! User records.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Date layout used in user payloads, e.g. `3/14/2024`.
pub const DATE_FORMAT: &str = "%-m/%-d/%Y";

/// A platform user.
///
/// Credentials and reset state never leave the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable identifier.
    pub id: String,
    /// Login email, stored lower-cased.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// The user must choose a new password at next login.
    pub must_change: bool,
    /// When the account was created.
    #[serde(serialize_with = "serialize_date")]
    pub date_created: DateTime<Utc>,
    /// When the account was last changed.
    #[serde(serialize_with = "serialize_date")]
    pub date_modified: DateTime<Utc>,
    /// Last successful login.
    #[serde(serialize_with = "serialize_optional_date")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) password_hash: String,
    #[serde(skip)]
    pub(crate) reset_token: Option<String>,
    #[serde(skip)]
    pub(crate) reset_token_expires: Option<DateTime<Utc>>,
}

impl User {
    /// A new user with a fresh ID and no password.
    pub fn new(email: &str, first_name: &str, last_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            email: email.trim().to_lowercase(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            must_change: false,
            date_created: now,
            date_modified: now,
            last_activity: None,
            password_hash: String::new(),
            reset_token: None,
            reset_token_expires: None,
        }
    }

    /// `first last`, as used in notifications.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub(crate) fn touch(&mut self) {
        self.date_modified = Utc::now();
    }

    pub(crate) fn reset_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.reset_token.is_some() && self.reset_token_expires.is_some_and(|exp| exp > now)
    }
}

/// Formats a timestamp with [`DATE_FORMAT`].
#[must_use]
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn serialize_date<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_date(date))
}

fn serialize_optional_date<S: Serializer>(
    date: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(date) => serializer.serialize_str(&format_date(date)),
        None => serializer.serialize_str(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_new_user_normalises_input() {
        let user = User::new("  Ada@Example.COM ", " Ada ", "Lovelace");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.full_name(), "Ada Lovelace");
        assert!(!user.must_change);
        assert_eq!(user.date_created, user.date_modified);
        assert!(Uuid::parse_str(&user.id).is_ok());
    }

    #[test]
    fn test_serialization_hides_credentials() {
        let mut user = User::new("ada@example.com", "Ada", "Lovelace");
        user.password_hash = "$2a$04$abcdefghijklmnopqrstuu".to_string();
        user.reset_token = Some("reset-me".to_string());
        user.date_created = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();

        let json = serde_json::to_value(&user).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 8);
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["mustChange"], false);
        assert_eq!(json["dateCreated"], "3/4/2024");
        assert_eq!(json["lastActivity"], "");

        let text = json.to_string();
        assert!(!text.contains("$2a$"));
        assert!(!text.contains("reset-me"));
    }

    #[test]
    fn test_reset_token_validity() {
        let now = Utc::now();
        let mut user = User::new("ada@example.com", "Ada", "Lovelace");
        assert!(!user.reset_token_valid(now));

        user.reset_token = Some("t".to_string());
        user.reset_token_expires = Some(now + Duration::hours(1));
        assert!(user.reset_token_valid(now));
        assert!(!user.reset_token_valid(now + Duration::hours(2)));
    }
}
