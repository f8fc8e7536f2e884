use crate::backend::traits::Backend;
use crate::error::{Error, Result};
use crate::models::{ImageUpload, Listing, ListingInsert, Session, User};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct SupabaseOptions {
    pub url: String,
    pub anon_key: String,
    pub table: String,
    pub bucket: String,
    pub timeout: Duration,
}

/// Backend speaking the hosted REST, storage and auth APIs
pub struct SupabaseBackend {
    client: Client,
    options: SupabaseOptions,
}

impl SupabaseBackend {
    pub fn new(options: SupabaseOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("room-finder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let options = SupabaseOptions {
            url: options.url.trim_end_matches('/').to_string(),
            ..options
        };

        Ok(Self { client, options })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.options.url, self.options.table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.options.url, path)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.options.url, self.options.bucket, key
        )
    }

    /// Request carrying the API key, authorized as the session user when there is one
    fn request(&self, method: Method, url: &str, session: Option<&Session>) -> RequestBuilder {
        let bearer = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(&self.options.anon_key);

        self.client
            .request(method, url)
            .header("apikey", &self.options.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Backend returned an error");
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response)
    }

    /// Owner-scoped PATCH/DELETE filter; rows owned by someone else never match
    fn owned_row_query(id: &str, session: &Session) -> [(&'static str, String); 2] {
        [
            ("id", format!("eq.{}", id)),
            ("owner_id", format!("eq.{}", session.user_id())),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user,
        }
    }
}

/// Pull a readable message out of the different error bodies the services return
fn error_message(body: &str) -> String {
    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.to_string(),
    };

    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| parsed.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn list_available(&self) -> Result<Vec<Listing>> {
        debug!(table = %self.options.table, "Fetching available listings");

        let request = self
            .request(Method::GET, &self.table_url(), None)
            .query(&[
                ("select", "*"),
                ("is_available", "eq.true"),
                ("order", "created_at.desc"),
            ]);

        let listings: Vec<Listing> = self.send(request).await?.json().await?;
        info!(count = listings.len(), "Fetched available listings");
        Ok(listings)
    }

    async fn list_owned(&self, session: &Session) -> Result<Vec<Listing>> {
        debug!(owner = session.user_id(), "Fetching owner listings");

        let request = self
            .request(Method::GET, &self.table_url(), Some(session))
            .query(&[
                ("select", "*".to_string()),
                ("owner_id", format!("eq.{}", session.user_id())),
                ("order", "created_at.desc".to_string()),
            ]);

        let listings: Vec<Listing> = self.send(request).await?.json().await?;
        Ok(listings)
    }

    async fn insert_listing(&self, session: &Session, row: &ListingInsert) -> Result<Listing> {
        let request = self
            .request(Method::POST, &self.table_url(), Some(session))
            .header("Prefer", "return=representation")
            .json(&[row]);

        let mut inserted: Vec<Listing> = self.send(request).await?.json().await?;
        let listing = inserted.pop().ok_or_else(|| Error::Api {
            status: 200,
            message: "insert returned no row".to_string(),
        })?;

        info!(id = %listing.id, "Inserted listing");
        Ok(listing)
    }

    async fn set_availability(&self, session: &Session, id: &str, available: bool) -> Result<Listing> {
        let request = self
            .request(Method::PATCH, &self.table_url(), Some(session))
            .query(&Self::owned_row_query(id, session))
            .header("Prefer", "return=representation")
            .json(&json!({
                "is_available": available,
                "updated_at": Utc::now(),
            }));

        let mut updated: Vec<Listing> = self.send(request).await?.json().await?;
        updated.pop().ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn delete_listing(&self, session: &Session, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.table_url(), Some(session))
            .query(&Self::owned_row_query(id, session))
            .header("Prefer", "return=representation");

        let deleted: Vec<Listing> = self.send(request).await?.json().await?;
        if deleted.is_empty() {
            return Err(Error::NotFound(id.to_string()));
        }
        info!(id, "Deleted listing");
        Ok(())
    }

    async fn upload_image(&self, session: &Session, key: &str, image: &ImageUpload) -> Result<()> {
        debug!(key, bytes = image.bytes.len(), "Uploading image");

        let request = self
            .request(Method::POST, &self.object_url(key), Some(session))
            .header(header::CONTENT_TYPE, &image.content_type)
            .header("x-upsert", "false")
            .body(image.bytes.clone());

        self.send(request).await?;
        Ok(())
    }

    fn public_image_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.options.url, self.options.bucket, key
        )
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Option<Session>> {
        let request = self
            .request(Method::POST, &self.auth_url("signup"), None)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name },
            }));

        // With email confirmation on, the service answers with a bare user instead of a token
        let body: serde_json::Value = self.send(request).await?.json().await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            Ok(Some(token.into()))
        } else {
            info!(email, "Account created, confirmation pending");
            Ok(None)
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .request(Method::POST, &self.auth_url("token"), None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let token: TokenResponse = self.send(request).await?.json().await?;
        Ok(token.into())
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let request = self.request(Method::POST, &self.auth_url("logout"), Some(session));
        self.send(request).await?;
        Ok(())
    }

    async fn current_user(&self, session: &Session) -> Result<User> {
        let request = self.request(Method::GET, &self.auth_url("user"), Some(session));
        let user: User = self.send(request).await?.json().await?;
        Ok(user)
    }

    fn backend_name(&self) -> &'static str {
        "Supabase"
    }
}
