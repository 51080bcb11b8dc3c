use serde::Serialize;
use tracing::{debug, info};

use crate::api::{Resources, keys};
use crate::error::{Error, Result};
use crate::models::{
    EmojiReaction, Listing, NewPost, Page, Post, PostUpdate, Reaction, ReactionStatus, TrendingTag,
};
use crate::net::{ApiRequest, MultipartBody};

const POSTS: &str = "/posts/";
const TRENDING_TAGS: &str = "/posts/trending-tags/";

fn post_path(id: &str) -> String {
    format!("/posts/{id}/")
}

#[derive(Serialize)]
struct PostBody<'a> {
    title: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    tag_names: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

#[derive(Serialize)]
struct EmojiBody<'a> {
    emoji: &'a str,
}

/// Posts, reactions and trending tags.
#[derive(Clone, Debug)]
pub struct PostsApi {
    res: Resources,
}

impl PostsApi {
    pub fn new(res: Resources) -> Self {
        Self { res }
    }

    /// One page of the feed, newest first.
    pub async fn list(&self, page: u32) -> Result<Page<Post>> {
        let page = page.max(1);
        let request = ApiRequest::get(POSTS).query("page", page);
        let listing: Listing<Post> = self.res.cached(&keys::post_listing(page), request).await?;
        Ok(listing.into_page())
    }

    pub async fn get(&self, id: &str) -> Result<Post> {
        self.res
            .cached(&keys::post(id), ApiRequest::get(post_path(id)))
            .await
    }

    /// Publish a story. Goes out as multipart when media is attached.
    pub async fn create(&self, post: &NewPost) -> Result<Post> {
        if post.title.trim().is_empty() || post.content.trim().is_empty() {
            return Err(Error::InvalidRequest("title and content are required".into()));
        }

        let request = match &post.media {
            Some(media) => {
                let mut body = MultipartBody::default()
                    .text("title", &post.title)
                    .text("content", &post.content);
                for tag in &post.tag_names {
                    body = body.text("tag_names", tag);
                }
                ApiRequest::post(POSTS).multipart(body.file(media.clone()))
            }
            None => ApiRequest::post(POSTS).json(&PostBody {
                title: &post.title,
                content: &post.content,
                tag_names: &post.tag_names,
            })?,
        };

        let value = self.res.call(&request).await?;
        let created: Post = serde_json::from_value(value.clone())?;

        let cache = self.res.cache();
        cache.set(&keys::post(&created.id).render(), value);
        keys::listing_changed(cache);
        info!(post_id = %created.id, "Post created");
        Ok(created)
    }

    /// Partial update. A 404 means the post was deleted elsewhere; its cached
    /// copy is dropped before the error is returned.
    pub async fn update(&self, id: &str, update: &PostUpdate) -> Result<Post> {
        let request = ApiRequest::patch(post_path(id)).json(update)?;
        let cache = self.res.cache();

        let value = match self.res.call(&request).await {
            Ok(value) => value,
            Err(err) if err.is_not_found() => {
                keys::post_removed(cache, id);
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let updated: Post = serde_json::from_value(value.clone())?;

        cache.set(&keys::post(id).render(), value);
        keys::listing_changed(cache);
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let outcome = self.res.client().execute(&ApiRequest::delete(post_path(id))).await;
        match outcome {
            Ok(()) => {}
            // Already gone: the cache still has to forget it.
            Err(err) if err.is_not_found() => debug!(post_id = id, "Post already deleted"),
            Err(err) => return Err(err),
        }
        keys::post_removed(self.res.cache(), id);
        info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Toggle one of the fixed reactions.
    pub async fn react(&self, id: &str, reaction: Reaction) -> Result<ReactionStatus> {
        let request = ApiRequest::post(format!("/posts/{id}/{}/", reaction.as_str()));
        let status = self.res.client().json(&request).await?;
        keys::post_changed(self.res.cache(), id);
        Ok(status)
    }

    /// Toggle an emoji reaction.
    pub async fn emoji_react(&self, id: &str, emoji: EmojiReaction) -> Result<ReactionStatus> {
        let request = ApiRequest::post(format!("/posts/{id}/emoji_react/")).json(&EmojiBody {
            emoji: emoji.emoji(),
        })?;
        let status = self.res.client().json(&request).await?;
        keys::post_changed(self.res.cache(), id);
        Ok(status)
    }

    pub async fn trending_tags(&self) -> Result<Vec<TrendingTag>> {
        let listing: Listing<TrendingTag> = self
            .res
            .cached(&keys::trending_tags(), ApiRequest::get(TRENDING_TAGS))
            .await?;
        Ok(listing.into_page().results)
    }
}
