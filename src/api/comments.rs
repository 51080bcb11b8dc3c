use tracing::info;

use crate::api::{Resources, keys};
use crate::error::{Error, Result};
use crate::models::{Comment, NewComment, Page};
use crate::net::ApiRequest;

fn comments_path(post_id: &str) -> String {
    format!("/posts/{post_id}/comments/")
}

/// Threaded comments on a post. Top-level comments carry their replies; a
/// reply's parent is always a top-level comment.
#[derive(Clone, Debug)]
pub struct CommentsApi {
    res: Resources,
}

impl CommentsApi {
    pub fn new(res: Resources) -> Self {
        Self { res }
    }

    /// One page of top-level comments.
    pub async fn list(&self, post_id: &str, page: u32) -> Result<Page<Comment>> {
        let page = page.max(1);
        let request = ApiRequest::get(comments_path(post_id)).query("page", page);
        self.res.cached(&keys::comments(post_id, page), request).await
    }

    /// Add a comment, or a reply when `parent` is set.
    pub async fn add(&self, post_id: &str, content: &str, parent: Option<&str>) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidRequest("comment content is empty".into()));
        }

        let request = ApiRequest::post(comments_path(post_id)).json(&NewComment {
            content: content.to_string(),
            parent: parent.map(str::to_string),
        })?;
        let comment: Comment = self.res.client().json(&request).await?;

        keys::comments_changed(self.res.cache(), post_id);
        info!(post_id, comment_id = %comment.id, reply = comment.is_reply(), "Comment added");
        Ok(comment)
    }

    pub async fn reply(&self, post_id: &str, parent_id: &str, content: &str) -> Result<Comment> {
        self.add(post_id, content, Some(parent_id)).await
    }

    pub async fn delete(&self, post_id: &str, comment_id: &str) -> Result<()> {
        let request = ApiRequest::delete(format!("/posts/{post_id}/comments/{comment_id}/"));
        self.res.client().execute(&request).await?;
        keys::comments_changed(self.res.cache(), post_id);
        info!(post_id, comment_id, "Comment deleted");
        Ok(())
    }
}
