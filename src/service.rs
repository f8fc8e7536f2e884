//! Application layer over a [`Backend`]: browsing, owner listings and the
//! create/toggle/delete flows.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::filter::{apply_filters, FilterCriteria};
use crate::models::{ImageUpload, Listing, ListingInsert, NewListing, Session, User};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Marketplace {
    backend: Arc<dyn Backend>,
}

fn require(session: Option<&Session>) -> Result<&Session> {
    session.ok_or(Error::NotSignedIn)
}

impl Marketplace {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Available listings, newest first, unfiltered
    pub async fn available_listings(&self) -> Result<Vec<Listing>> {
        self.backend.list_available().await
    }

    /// Available listings narrowed down by `criteria`
    pub async fn browse(&self, criteria: &FilterCriteria) -> Result<Vec<Listing>> {
        let listings = self.backend.list_available().await?;
        Ok(apply_filters(&listings, criteria))
    }

    pub async fn my_listings(&self, session: Option<&Session>) -> Result<Vec<Listing>> {
        let session = require(session)?;
        self.backend.list_owned(session).await
    }

    /// Create a listing owned by the session user.
    ///
    /// The image, when given, is uploaded first; if that fails nothing is inserted.
    pub async fn create_listing(
        &self,
        session: Option<&Session>,
        form: NewListing,
        image: Option<ImageUpload>,
    ) -> Result<Listing> {
        let session = require(session)?;

        let missing = form.missing_fields();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let image_url = match image {
            Some(image) => {
                let key = image.storage_key(session.user_id(), Utc::now());
                debug!(key = %key, "Uploading listing image");
                self.backend.upload_image(session, &key, &image).await?;
                Some(self.backend.public_image_url(&key))
            }
            None => None,
        };

        let row = ListingInsert {
            form,
            owner_id: session.user_id().to_string(),
            image_url,
            is_available: true,
        };

        let listing = self.backend.insert_listing(session, &row).await?;
        info!(id = %listing.id, owner = session.user_id(), "Created listing");
        Ok(listing)
    }

    pub async fn set_availability(
        &self,
        session: Option<&Session>,
        id: &str,
        available: bool,
    ) -> Result<Listing> {
        let session = require(session)?;
        let listing = self.backend.set_availability(session, id, available).await?;
        info!(id, available, "Updated listing availability");
        Ok(listing)
    }

    /// Flip the availability of a listing the caller already has in hand
    pub async fn toggle_availability(&self, session: Option<&Session>, listing: &Listing) -> Result<Listing> {
        let session = require(session)?;
        if !listing.is_owned_by(session.user_id()) {
            return Err(Error::NotOwner(listing.id.clone()));
        }
        self.set_availability(Some(session), &listing.id, !listing.is_available)
            .await
    }

    /// Delete a listing after `confirm` agrees. A refusal issues no backend call.
    pub async fn delete_listing<F>(&self, session: Option<&Session>, id: &str, confirm: F) -> Result<()>
    where
        F: FnOnce(&str) -> bool,
    {
        let session = require(session)?;
        if !confirm(id) {
            debug!(id, "Deletion cancelled");
            return Err(Error::NotConfirmed(id.to_string()));
        }

        self.backend.delete_listing(session, id).await?;
        info!(id, "Deleted listing");
        Ok(())
    }

    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Option<Session>> {
        let session = self.backend.sign_up(email, password, name).await?;
        if session.is_none() {
            warn!(email, "Sign-up needs email confirmation before sign-in");
        }
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.backend.sign_in(email, password).await?;
        info!(user = session.user_id(), "Signed in");
        Ok(session)
    }

    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        self.backend.sign_out(session).await
    }

    pub async fn current_user(&self, session: Option<&Session>) -> Result<User> {
        let session = require(session)?;
        self.backend.current_user(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::{PropertyType, TenantPreference};

    async fn setup() -> (Arc<MemoryBackend>, Marketplace, Session) {
        let backend = Arc::new(MemoryBackend::with_sample_data());
        let market = Marketplace::new(backend.clone());
        let session = market
            .sign_up("owner@example.com", "secret", "Owner")
            .await
            .unwrap()
            .unwrap();
        (backend, market, session)
    }

    fn form(user: &User) -> NewListing {
        NewListing {
            title: "Bright room".into(),
            description: "Top floor".into(),
            location: "Baner".into(),
            city: "Pune".into(),
            rent_price: 14_000,
            property_type: PropertyType::TwoBhk,
            tenant_preference: TenantPreference::Working,
            owner_contact: "+91 90000 00000".into(),
            ..NewListing::for_user(user)
        }
    }

    #[tokio::test]
    async fn create_requires_session() {
        let (_, market, session) = setup().await;
        let err = market
            .create_listing(None, form(&session.user), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSignedIn));
    }

    #[tokio::test]
    async fn create_sets_owner_and_availability() {
        let (_, market, session) = setup().await;
        let listing = market
            .create_listing(Some(&session), form(&session.user), None)
            .await
            .unwrap();

        assert_eq!(listing.owner_id, session.user_id());
        assert_eq!(listing.owner_name, "Owner");
        assert_eq!(listing.owner_email, "owner@example.com");
        assert!(listing.is_available);
        assert!(listing.image_url.is_none());

        let mine = market.my_listings(Some(&session)).await.unwrap();
        assert_eq!(mine, vec![listing]);
    }

    #[tokio::test]
    async fn create_uploads_image_first() {
        let (backend, market, session) = setup().await;
        let image = ImageUpload::new("room.png", vec![0x89, 0x50]);
        let listing = market
            .create_listing(Some(&session), form(&session.user), Some(image.clone()))
            .await
            .unwrap();

        let url = listing.image_url.unwrap();
        let key = url.strip_prefix("memory://room-images/").unwrap();
        assert!(key.starts_with(&format!("{}/", session.user_id())), "{}", key);
        assert!(key.ends_with(".png"), "{}", key);
        assert_eq!(backend.stored_image(key), Some(image));
    }

    #[tokio::test]
    async fn failed_upload_aborts_creation() {
        let (backend, market, session) = setup().await;
        backend.fail_uploads(true);

        let before = backend.listing_count();
        let result = market
            .create_listing(
                Some(&session),
                form(&session.user),
                Some(ImageUpload::new("room.jpg", vec![1])),
            )
            .await;

        assert!(matches!(result, Err(Error::Api { status: 503, .. })));
        assert_eq!(backend.listing_count(), before);
    }

    #[tokio::test]
    async fn blank_fields_fail_validation() {
        let (backend, market, session) = setup().await;
        let mut incomplete = form(&session.user);
        incomplete.owner_contact.clear();

        let err = market
            .create_listing(Some(&session), incomplete, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("owner_contact")));
        assert_eq!(backend.listing_count(), 5);
    }

    #[tokio::test]
    async fn toggle_flips_and_hides_from_browse() {
        let (_, market, session) = setup().await;
        let listing = market
            .create_listing(Some(&session), form(&session.user), None)
            .await
            .unwrap();

        let hidden = market.toggle_availability(Some(&session), &listing).await.unwrap();
        assert!(!hidden.is_available);
        let visible = market.browse(&FilterCriteria::default()).await.unwrap();
        assert!(visible.iter().all(|l| l.id != listing.id));

        let shown = market.toggle_availability(Some(&session), &hidden).await.unwrap();
        assert!(shown.is_available);
    }

    #[tokio::test]
    async fn toggle_rejects_foreign_listing() {
        let (_, market, session) = setup().await;
        let foreign = market.available_listings().await.unwrap().remove(0);
        let err = market
            .toggle_availability(Some(&session), &foreign)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
    }

    #[tokio::test]
    async fn delete_needs_confirmation() {
        let (backend, market, session) = setup().await;
        let listing = market
            .create_listing(Some(&session), form(&session.user), None)
            .await
            .unwrap();

        let err = market
            .delete_listing(Some(&session), &listing.id, |_| false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfirmed(_)));
        assert_eq!(backend.listing_count(), 6);

        market
            .delete_listing(Some(&session), &listing.id, |id| id == listing.id)
            .await
            .unwrap();
        assert_eq!(backend.listing_count(), 5);
        assert!(market.my_listings(Some(&session)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_rejects_foreign_listing() {
        let (backend, market, session) = setup().await;
        let err = market
            .delete_listing(Some(&session), "sample-1", |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
        assert_eq!(backend.listing_count(), 5);
    }

    #[tokio::test]
    async fn browse_applies_criteria() {
        let (_, market, _) = setup().await;
        let criteria = FilterCriteria::default()
            .with_city("pune")
            .with_price_range("10000", "20000");
        let found = market.browse(&criteria).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "sample-1");
    }
}
