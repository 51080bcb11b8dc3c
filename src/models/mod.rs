//! Response and request shapes of the feed REST contract.

mod comment;
mod post;
mod user;

pub use comment::{Comment, CommentAuthor, NewComment};
pub use post::{Author, EmojiReaction, NewPost, Post, PostUpdate, Reaction, ReactionStatus, Tag, TrendingTag};
pub use user::{ProfileUpdate, User};

use serde::{Deserialize, Deserializer, Serialize};

/// Paginated envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Listing endpoints answer with either a [`Page`] or a bare array depending
/// on server pagination settings.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Paged(Page<T>),
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub(crate) fn into_page(self) -> Page<T> {
        match self {
            Self::Paged(page) => page,
            Self::Plain(results) => Page {
                count: results.len() as u64,
                results,
                next: None,
                previous: None,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Ids arrive as JSON numbers on some resources and strings on others.
pub(crate) fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

pub(crate) fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?.map(String::from))
}
