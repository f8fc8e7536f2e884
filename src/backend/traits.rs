use crate::error::Result;
use crate::models::{ImageUpload, Listing, ListingInsert, Session, User};
use async_trait::async_trait;

/// Operations the hosted backend provides: table access, object storage and auth.
///
/// Implementations must enforce the owner rule themselves: updates and deletes
/// only ever touch rows whose `owner_id` matches the session user.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Available listings, newest first
    async fn list_available(&self) -> Result<Vec<Listing>>;

    /// All listings owned by the session user, newest first
    async fn list_owned(&self, session: &Session) -> Result<Vec<Listing>>;

    async fn insert_listing(&self, session: &Session, row: &ListingInsert) -> Result<Listing>;

    async fn set_availability(&self, session: &Session, id: &str, available: bool) -> Result<Listing>;

    async fn delete_listing(&self, session: &Session, id: &str) -> Result<()>;

    /// Store an image blob under `key` in the image bucket
    async fn upload_image(&self, session: &Session, key: &str, image: &ImageUpload) -> Result<()>;

    /// Public URL of an object previously stored under `key`
    fn public_image_url(&self, key: &str) -> String;

    /// Create an account. Returns a session when the backend signs the user in right away.
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, session: &Session) -> Result<()>;

    async fn current_user(&self, session: &Session) -> Result<User>;

    /// Get the name of the backend
    fn backend_name(&self) -> &'static str;
}
