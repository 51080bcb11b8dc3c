use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::net::request::Attachment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "super::id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial profile update. Sent as a multipart form so a new picture can ride
/// along with the text fields.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<Attachment>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.bio.is_none() && self.profile_picture.is_none()
    }
}
