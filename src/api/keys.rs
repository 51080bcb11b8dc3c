//! Cache keys of the resource endpoints and the invalidations each write
//! performs.

use serde_json::Value;

use crate::cache::{CacheKey, ResponseCache};

/// Prefix shared by every page of the post listing.
pub const POST_LISTING_PREFIX: &str = "posts?";

pub fn post_listing(page: u32) -> CacheKey {
    CacheKey::new("posts").param("page", page)
}

pub fn post(id: &str) -> CacheKey {
    CacheKey::new(format!("posts/{id}"))
}

pub fn trending_tags() -> CacheKey {
    CacheKey::new("posts/trending-tags")
}

/// Prefix shared by every page of one post's comments.
pub fn comments_prefix(post_id: &str) -> String {
    format!("posts/{post_id}/comments?")
}

pub fn comments(post_id: &str, page: u32) -> CacheKey {
    CacheKey::new(format!("posts/{post_id}/comments")).param("page", page)
}

pub fn profile() -> CacheKey {
    CacheKey::new("users/profile")
}

pub fn suggested_users() -> CacheKey {
    CacheKey::new("users/suggested")
}

/// A post's content changed: drop it and every listing page.
pub(crate) fn post_changed(cache: &ResponseCache<Value>, post_id: &str) {
    cache.delete(&post(post_id).render());
    cache.delete_prefix(POST_LISTING_PREFIX);
}

/// The set of posts or their tags changed.
pub(crate) fn listing_changed(cache: &ResponseCache<Value>) {
    cache.delete_prefix(POST_LISTING_PREFIX);
    cache.delete(&trending_tags().render());
}

/// A comment was added or removed on a post.
pub(crate) fn comments_changed(cache: &ResponseCache<Value>, post_id: &str) {
    cache.delete_prefix(&comments_prefix(post_id));
    post_changed(cache, post_id);
}

/// A post is gone, along with its comments.
pub(crate) fn post_removed(cache: &ResponseCache<Value>, post_id: &str) {
    cache.delete_prefix(&comments_prefix(post_id));
    cache.delete(&post(post_id).render());
    listing_changed(cache);
}
