//! User record entity and related types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::normalize_email;

/// User identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a Post entity. Only the identifier is held here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Assignable fields of a user record, used for change tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Name,
    BirthYear,
    Gender,
    PlaceState,
    PlaceCity,
    IsAdmin,
    Email,
    Password,
    Posts,
}

impl UserField {
    pub const ALL: [UserField; 9] = [
        UserField::Name,
        UserField::BirthYear,
        UserField::Gender,
        UserField::PlaceState,
        UserField::PlaceCity,
        UserField::IsAdmin,
        UserField::Email,
        UserField::Password,
        UserField::Posts,
    ];

    /// Field name as it appears in the output representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::BirthYear => "birthYear",
            Self::Gender => "gender",
            Self::PlaceState => "placeState",
            Self::PlaceCity => "placeCity",
            Self::IsAdmin => "isAdmin",
            Self::Email => "email",
            Self::Password => "password",
            Self::Posts => "posts",
        }
    }
}

impl std::fmt::Display for UserField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every stored attribute of a user record, as read back from a store
#[derive(Debug, Clone)]
pub struct UserRecordParts {
    pub id: UserId,
    pub name: Option<String>,
    pub birth_year: Option<i32>,
    pub gender: Option<String>,
    pub place_state: Option<String>,
    pub place_city: Option<String>,
    pub is_admin: bool,
    pub email: String,
    pub password: String,
    pub posts: Vec<PostId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

/// User account record.
///
/// The `Serialize` impl is the output representation: the password and the
/// internal version marker are never written. Persistence goes through
/// [`UserRecordParts`] and the store implementations instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    id: UserId,
    name: Option<String>,
    birth_year: Option<i32>,
    gender: Option<String>,
    place_state: Option<String>,
    place_city: Option<String>,
    is_admin: bool,
    email: String,
    /// Plaintext until the record is saved, a salted hash afterwards
    #[serde(skip_serializing)]
    password: String,
    posts: Vec<PostId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    version: u32,
    #[serde(skip_serializing)]
    dirty: HashSet<UserField>,
    #[serde(skip_serializing)]
    is_new: bool,
    /// Values as of the last load or save; `None` until first persisted
    #[serde(skip_serializing)]
    persisted: Option<Box<UserRecordParts>>,
}

impl UserRecord {
    /// Create a new, unsaved record. The email is lowercased and the
    /// password is held as plaintext until the first save.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id: UserId::new(),
            name: None,
            birth_year: None,
            gender: None,
            place_state: None,
            place_city: None,
            is_admin: false,
            email: normalize_email(&email.into()),
            password: password.into(),
            posts: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
            dirty: HashSet::from([UserField::Email, UserField::Password]),
            is_new: true,
            persisted: None,
        }
    }

    /// Rebuild a persisted record. The result has no pending changes.
    pub fn from_parts(parts: UserRecordParts) -> Self {
        let persisted = Some(Box::new(parts.clone()));

        Self {
            id: parts.id,
            name: parts.name,
            birth_year: parts.birth_year,
            gender: parts.gender,
            place_state: parts.place_state,
            place_city: parts.place_city,
            is_admin: parts.is_admin,
            email: parts.email,
            password: parts.password,
            posts: parts.posts,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
            dirty: HashSet::new(),
            is_new: false,
            persisted,
        }
    }

    /// Every stored attribute, as a store writes it
    pub fn to_parts(&self) -> UserRecordParts {
        UserRecordParts {
            id: self.id,
            name: self.name.clone(),
            birth_year: self.birth_year,
            gender: self.gender.clone(),
            place_state: self.place_state.clone(),
            place_city: self.place_city.clone(),
            is_admin: self.is_admin,
            email: self.email.clone(),
            password: self.password.clone(),
            posts: self.posts.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }

    // Builders

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.set_name(Some(name.into()));
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.set_admin(is_admin);
        self
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth_year
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    pub fn place_state(&self) -> Option<&str> {
        self.place_state.as_deref()
    }

    pub fn place_city(&self) -> Option<&str> {
        self.place_city.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Current password value: plaintext while a change is pending, the
    /// stored hash otherwise
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn posts(&self) -> &[PostId] {
        &self.posts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    // Mutators

    pub fn set_name(&mut self, name: Option<String>) {
        if self.name != name {
            self.name = name;
            self.track(UserField::Name);
        }
    }

    pub fn set_birth_year(&mut self, birth_year: Option<i32>) {
        if self.birth_year != birth_year {
            self.birth_year = birth_year;
            self.track(UserField::BirthYear);
        }
    }

    pub fn set_gender(&mut self, gender: Option<String>) {
        if self.gender != gender {
            self.gender = gender;
            self.track(UserField::Gender);
        }
    }

    pub fn set_place_state(&mut self, place_state: Option<String>) {
        if self.place_state != place_state {
            self.place_state = place_state;
            self.track(UserField::PlaceState);
        }
    }

    pub fn set_place_city(&mut self, place_city: Option<String>) {
        if self.place_city != place_city {
            self.place_city = place_city;
            self.track(UserField::PlaceCity);
        }
    }

    pub fn set_admin(&mut self, is_admin: bool) {
        if self.is_admin != is_admin {
            self.is_admin = is_admin;
            self.track(UserField::IsAdmin);
        }
    }

    /// Update the email. The value is lowercased before it is compared or stored.
    pub fn set_email(&mut self, email: impl Into<String>) {
        let email = normalize_email(&email.into());
        if self.email != email {
            self.email = email;
            self.track(UserField::Email);
        }
    }

    /// Set a new plaintext password. It is hashed on the next save.
    pub fn set_password(&mut self, password: impl Into<String>) {
        let password = password.into();
        if self.password != password {
            self.password = password;
            self.track(UserField::Password);
        }
    }

    pub fn set_posts(&mut self, posts: Vec<PostId>) {
        if self.posts != posts {
            self.posts = posts;
            self.track(UserField::Posts);
        }
    }

    /// Append a post reference
    pub fn add_post(&mut self, post: PostId) {
        self.posts.push(post);
        self.track(UserField::Posts);
    }

    /// Remove every occurrence of a post reference, returning whether any was present
    pub fn remove_post(&mut self, post: &PostId) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p != post);

        let removed = self.posts.len() != before;
        if removed {
            self.track(UserField::Posts);
        }
        removed
    }

    /// A field is dirty while it differs from its persisted value. Records
    /// never persisted keep every assigned field dirty.
    fn track(&mut self, field: UserField) {
        let reverted = self
            .persisted
            .as_deref()
            .is_some_and(|persisted| self.matches_persisted(field, persisted));

        if reverted {
            self.dirty.remove(&field);
        } else {
            self.dirty.insert(field);
        }
    }

    fn matches_persisted(&self, field: UserField, persisted: &UserRecordParts) -> bool {
        match field {
            UserField::Name => self.name == persisted.name,
            UserField::BirthYear => self.birth_year == persisted.birth_year,
            UserField::Gender => self.gender == persisted.gender,
            UserField::PlaceState => self.place_state == persisted.place_state,
            UserField::PlaceCity => self.place_city == persisted.place_city,
            UserField::IsAdmin => self.is_admin == persisted.is_admin,
            UserField::Email => self.email == persisted.email,
            UserField::Password => self.password == persisted.password,
            UserField::Posts => self.posts == persisted.posts,
        }
    }

    // Change tracking

    /// Whether the record has never been persisted
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether a field changed since construction, load or the last save
    pub fn is_modified(&self, field: UserField) -> bool {
        self.dirty.contains(&field)
    }

    /// Changed fields in declaration order
    pub fn modified_fields(&self) -> Vec<UserField> {
        UserField::ALL
            .into_iter()
            .filter(|f| self.dirty.contains(f))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.is_new || !self.dirty.is_empty()
    }

    /// Swap the pending plaintext for its hash. The field stays dirty until
    /// the record is persisted.
    pub(crate) fn replace_password_hash(&mut self, hash: String) {
        self.password = hash;
    }

    /// Apply the automatic timestamps for a write happening at `now`
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        if self.is_new {
            self.created_at = now;
        }
        self.updated_at = now;
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Forget pending changes after a successful write
    pub(crate) fn mark_persisted(&mut self) {
        self.dirty.clear();
        self.is_new = false;
        self.persisted = Some(Box::new(self.to_parts()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_record() -> UserRecord {
        let now = Utc::now();
        UserRecord::from_parts(UserRecordParts {
            id: UserId::new(),
            name: Some("Taro".to_string()),
            birth_year: Some(1990),
            gender: None,
            place_state: Some("Tokyo".to_string()),
            place_city: None,
            is_admin: false,
            email: "taro@example.com".to_string(),
            password: "$argon2id$stored".to_string(),
            posts: vec![],
            created_at: now,
            updated_at: now,
            version: 3,
        })
    }

    #[test]
    fn test_new_record_defaults() {
        let record = UserRecord::new("u@test.com", "secret1");

        assert_eq!(record.email(), "u@test.com");
        assert_eq!(record.password(), "secret1");
        assert!(record.name().is_none());
        assert!(record.birth_year().is_none());
        assert!(record.gender().is_none());
        assert!(record.place_state().is_none());
        assert!(record.place_city().is_none());
        assert!(!record.is_admin());
        assert!(record.posts().is_empty());
        assert_eq!(record.version(), 0);
        assert!(record.is_new());
    }

    #[test]
    fn test_new_record_lowercases_email() {
        let record = UserRecord::new("A@X.com", "secret1");
        assert_eq!(record.email(), "a@x.com");
    }

    #[test]
    fn test_new_record_tracks_password_as_modified() {
        let record = UserRecord::new("u@test.com", "secret1");

        assert!(record.is_modified(UserField::Password));
        assert!(record.is_modified(UserField::Email));
        assert!(!record.is_modified(UserField::Name));
    }

    #[test]
    fn test_loaded_record_is_clean() {
        let record = loaded_record();

        assert!(!record.is_new());
        assert!(!record.has_changes());
        assert!(record.modified_fields().is_empty());
        assert_eq!(record.version(), 3);
    }

    #[test]
    fn test_setter_marks_only_changed_field() {
        let mut record = loaded_record();

        record.set_name(Some("Hanako".to_string()));

        assert_eq!(record.modified_fields(), vec![UserField::Name]);
        assert!(!record.is_modified(UserField::Password));
    }

    #[test]
    fn test_setting_same_value_is_not_a_change() {
        let mut record = loaded_record();

        record.set_name(Some("Taro".to_string()));
        record.set_email("TARO@example.com");

        assert!(!record.has_changes());
    }

    #[test]
    fn test_reverting_to_loaded_value_clears_change() {
        let mut record = loaded_record();

        record.set_email("other@example.com");
        assert!(record.is_modified(UserField::Email));

        record.set_email("Taro@example.com");
        assert!(!record.is_modified(UserField::Email));

        record.set_password("tmp");
        record.set_password("$argon2id$stored");
        assert!(!record.is_modified(UserField::Password));
        assert!(!record.has_changes());
    }

    #[test]
    fn test_reverting_posts_clears_change() {
        let mut record = loaded_record();
        let post = PostId::new();

        record.add_post(post);
        assert!(record.remove_post(&post));

        assert!(!record.is_modified(UserField::Posts));
    }

    #[test]
    fn test_new_record_keeps_password_dirty_after_revert() {
        let mut record = UserRecord::new("u@test.com", "secret1");

        record.set_password("other");
        record.set_password("secret1");

        assert!(record.is_modified(UserField::Password));
    }

    #[test]
    fn test_to_parts_round_trip_is_clean() {
        let record = UserRecord::new("u@test.com", "secret1").with_name("Taro");

        let stored = UserRecord::from_parts(record.to_parts());

        assert_eq!(stored.id(), record.id());
        assert_eq!(stored.name(), Some("Taro"));
        assert!(!stored.is_new());
        assert!(!stored.has_changes());
    }

    #[test]
    fn test_set_password_marks_dirty() {
        let mut record = loaded_record();

        record.set_password("new-secret");

        assert!(record.is_modified(UserField::Password));
        assert_eq!(record.password(), "new-secret");
    }

    #[test]
    fn test_post_references() {
        let mut record = loaded_record();
        let first = PostId::new();
        let second = PostId::new();

        record.add_post(first);
        record.add_post(second);
        assert_eq!(record.posts(), &[first, second]);
        assert!(record.is_modified(UserField::Posts));

        assert!(record.remove_post(&first));
        assert!(!record.remove_post(&first));
        assert_eq!(record.posts(), &[second]);
    }

    #[test]
    fn test_mark_persisted_clears_changes() {
        let mut record = UserRecord::new("u@test.com", "secret1");

        record.mark_persisted();

        assert!(!record.is_new());
        assert!(!record.has_changes());

        // The saved values become the new baseline
        record.set_name(Some("Taro".to_string()));
        record.set_name(None);
        assert!(!record.has_changes());
    }

    #[test]
    fn test_stamp_sets_created_at_only_for_new_records() {
        let mut record = loaded_record();
        let created = record.created_at();
        let later = created + chrono::Duration::seconds(5);

        record.stamp(later);

        assert_eq!(record.created_at(), created);
        assert_eq!(record.updated_at(), later);
    }

    #[test]
    fn test_serialization_excludes_password_and_version() {
        let record = UserRecord::new("u@test.com", "secret1").with_name("Taro");

        let json = serde_json::to_value(&record).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("version"));
        assert!(!json.to_string().contains("secret1"));
        assert_eq!(object["email"], "u@test.com");
        assert_eq!(object["name"], "Taro");
        assert_eq!(object["isAdmin"], false);
        assert!(object["birthYear"].is_null());
        assert!(object.contains_key("createdAt"));
        assert!(object.contains_key("updatedAt"));
    }

    #[test]
    fn test_user_field_names() {
        assert_eq!(UserField::BirthYear.as_str(), "birthYear");
        assert_eq!(UserField::IsAdmin.to_string(), "isAdmin");
    }
}
