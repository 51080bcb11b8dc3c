//! Typed endpoints over the feed REST contract.
//!
//! Reads go through the [`ResponseCache`]; writes invalidate or reseed the
//! keys they affect (see [`keys`]).

pub mod comments;
pub mod keys;
pub mod media;
pub mod posts;
pub mod users;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{CacheKey, ResponseCache};
use crate::error::Result;
use crate::net::{ApiClient, ApiRequest};

pub use comments::CommentsApi;
pub use media::{PLACEHOLDER_IMAGE, media_url};
pub use posts::PostsApi;
pub use users::UsersApi;

/// Client and cache shared by the resource handles.
#[derive(Clone, Debug)]
pub struct Resources {
    client: ApiClient,
    cache: ResponseCache<Value>,
}

impl Resources {
    pub fn new(client: ApiClient, cache: ResponseCache<Value>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    /// Read through the cache and decode.
    pub(crate) async fn cached<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        request: ApiRequest,
    ) -> Result<T> {
        let client = self.client.clone();
        let value = self
            .cache
            .get(&key.render(), move || async move {
                client.json::<Value>(&request).await
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Uncached call returning the raw JSON body.
    pub(crate) async fn call(&self, request: &ApiRequest) -> Result<Value> {
        self.client.json(request).await
    }
}
