use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::Entity;

/// A registered studio member. `email` is the login key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string.
    pub password: String,
    pub admin: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: &str, first_name: &str, last_name: &str, password_hash: &str, admin: bool) -> Self {
        Self {
            id: None,
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            password: password_hash.to_string(),
            admin,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for User {
    const KIND: &'static str = "user";
    fn id(&self) -> Option<i64> { self.id }
    fn assign_id(&mut self, id: i64) { self.id = Some(id); }
    fn unique_key(&self) -> Option<&str> { Some(self.email.as_str()) }
    fn touch(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() { self.created_at = Some(now); }
        self.updated_at = Some(now);
    }
}

/// A scheduled yoga class. `users` holds the ids of participating members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YogaSession {
    pub id: Option<i64>,
    pub name: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub teacher_id: Option<i64>,
    pub users: BTreeSet<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl YogaSession {
    pub fn new(name: &str, description: &str, date: DateTime<Utc>, teacher_id: Option<i64>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            date,
            description: description.to_string(),
            teacher_id,
            users: BTreeSet::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for YogaSession {
    const KIND: &'static str = "session";
    fn id(&self) -> Option<i64> { self.id }
    fn assign_id(&mut self, id: i64) { self.id = Some(id); }
    fn touch(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() { self.created_at = Some(now); }
        self.updated_at = Some(now);
    }
}
