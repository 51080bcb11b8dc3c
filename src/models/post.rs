use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::net::request::Attachment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "super::opt_id")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(deserialize_with = "super::id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTag {
    pub tag: Tag,
    #[serde(default)]
    pub post_count: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "super::id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub hug_count: u64,
    #[serde(default)]
    pub relate_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_hugged: bool,
    #[serde(default)]
    pub is_related: bool,

    #[serde(default)]
    pub emoji_reactions: HashMap<String, u64>,
    #[serde(default)]
    pub user_emoji_reactions: Vec<String>,
    #[serde(default)]
    pub laugh_count: u64,
    #[serde(default)]
    pub fire_count: u64,
    #[serde(default)]
    pub check_count: u64,
}

impl Post {
    /// Count for one of the fixed reaction types.
    pub fn reaction_count(&self, reaction: Reaction) -> u64 {
        match reaction {
            Reaction::Like => self.like_count,
            Reaction::Hug => self.hug_count,
            Reaction::Relate => self.relate_count,
        }
    }

    pub fn has_reacted(&self, reaction: Reaction) -> bool {
        match reaction {
            Reaction::Like => self.is_liked,
            Reaction::Hug => self.is_hugged,
            Reaction::Relate => self.is_related,
        }
    }
}

/// Fixed reaction types; each is a toggle on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reaction {
    Like,
    Hug,
    Relate,
}

impl Reaction {
    /// Path segment of the reaction endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Hug => "hug",
            Self::Relate => "relate",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Reaction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(Self::Like),
            "hug" => Ok(Self::Hug),
            "relate" => Ok(Self::Relate),
            other => Err(format!("unknown reaction '{other}' (expected like, hug or relate)")),
        }
    }
}

/// Emoji the server accepts on `emoji_react`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmojiReaction {
    Laugh,
    Fire,
    Check,
}

impl EmojiReaction {
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Laugh => "😂",
            Self::Fire => "🔥",
            Self::Check => "✅",
        }
    }
}

/// Body returned by a reaction toggle, e.g. `{"status": "liked"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionStatus {
    #[serde(default)]
    pub status: Option<String>,
}

/// A new story. Sent as JSON, or as a multipart form when media is attached.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub tag_names: Vec<String>,
    pub media: Option<Attachment>,
}

/// Partial update of an existing post.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_names: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_deserializes_server_shape() {
        let body = r#"{
            "id": 3,
            "title": "Shipped on a Friday",
            "content": "...",
            "author": {"id": 1, "username": "sam", "profile_picture": null},
            "tags": [{"id": 9, "name": "deploys", "slug": "deploys", "description": null}],
            "like_count": 4, "hug_count": 1, "relate_count": 0,
            "is_liked": true, "is_hugged": false, "is_related": false,
            "emoji_reactions": {"🔥": 2},
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(body).unwrap();
        assert_eq!(post.id, "3");
        assert_eq!(post.tags[0].name, "deploys");
        assert_eq!(post.reaction_count(Reaction::Like), 4);
        assert!(post.has_reacted(Reaction::Like));
        assert_eq!(post.emoji_reactions.get("🔥"), Some(&2));
        assert_eq!(post.laugh_count, 0);
    }

    #[test]
    fn test_reaction_parse() {
        assert_eq!("Hug".parse::<Reaction>().unwrap(), Reaction::Hug);
        assert!("roast".parse::<Reaction>().is_err());
    }

    #[test]
    fn test_post_update_skips_unset_fields() {
        let update = PostUpdate {
            title: Some("new".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"title":"new"}"#);
    }
}
