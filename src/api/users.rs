use serde::Serialize;
use tracing::info;

use crate::api::{Resources, keys};
use crate::error::{Error, Result};
use crate::models::{ProfileUpdate, User};
use crate::net::{ApiRequest, MultipartBody};

const PROFILE: &str = "/users/profile/";
const SUGGESTED: &str = "/users/suggested/";
const PASSWORD_RESET: &str = "/users/password-reset/";
const PASSWORD_RESET_CONFIRM: &str = "/users/password-reset/confirm/";

#[derive(Serialize)]
struct ResetRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct ResetConfirm<'a> {
    token: &'a str,
    password: &'a str,
    password2: &'a str,
}

/// Profile, suggestions and password reset.
#[derive(Clone, Debug)]
pub struct UsersApi {
    res: Resources,
}

impl UsersApi {
    pub fn new(res: Resources) -> Self {
        Self { res }
    }

    pub async fn profile(&self) -> Result<User> {
        self.res.cached(&keys::profile(), ApiRequest::get(PROFILE)).await
    }

    /// Update the signed-in user's profile. The response reseeds the cached
    /// profile and the session's user record.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(Error::InvalidRequest("nothing to update".into()));
        }

        let mut body = MultipartBody::default();
        if let Some(username) = &update.username {
            body = body.text("username", username);
        }
        if let Some(bio) = &update.bio {
            body = body.text("bio", bio);
        }
        if let Some(picture) = &update.profile_picture {
            body = body.file(picture.clone());
        }

        let value = self
            .res
            .call(&ApiRequest::patch(PROFILE).multipart(body))
            .await?;
        let user: User = serde_json::from_value(value.clone())?;

        self.res.cache().set(&keys::profile().render(), value);
        self.res.client().auth().set_user(user.clone());
        info!(username = %user.username, "Profile updated");
        Ok(user)
    }

    pub async fn suggested(&self) -> Result<Vec<User>> {
        self.res
            .cached(&keys::suggested_users(), ApiRequest::get(SUGGESTED))
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post(PASSWORD_RESET).json(&ResetRequest { email })?;
        self.res.client().execute(&request).await
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        password: &str,
        password2: &str,
    ) -> Result<()> {
        if password != password2 {
            return Err(Error::InvalidRequest("passwords do not match".into()));
        }
        let request = ApiRequest::post(PASSWORD_RESET_CONFIRM).json(&ResetConfirm {
            token,
            password,
            password2,
        })?;
        self.res.client().execute(&request).await
    }
}
