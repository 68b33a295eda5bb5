//! Directory records: users, organizations and meetings.
//!
//! These rows form the authorization chain that scopes every agenda-item
//! read. Soft-deleting any of them hides everything below it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type OrgId = Uuid;

/// Person that can sign in through an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Subject claim from the identity provider; how callers are resolved.
    pub social_id: Option<String>,
    pub email: String,
    pub full_name: Option<String>,
}

impl User {
    pub fn new(social_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            social_id: Some(social_id.into()),
            email: email.into(),
            full_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A scheduled meeting owned by exactly one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub org_id: OrgId,
    pub title: String,
    pub conference: Option<String>,
    /// Unix epoch milliseconds.
    pub meeting_date: i64,
    /// Planned length in minutes.
    pub duration: Option<i64>,
}

impl Meeting {
    pub fn new(org_id: OrgId, title: impl Into<String>, meeting_date: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            title: title.into(),
            conference: None,
            meeting_date,
            duration: None,
        }
    }
}
