use crate::backend::traits::Backend;
use crate::error::{Error, Result};
use crate::models::{
    ImageUpload, Listing, ListingInsert, PropertyType, Session, TenantPreference, User, UserMetadata,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

const PUBLIC_BASE: &str = "memory://room-images";

struct Account {
    password: String,
    user: User,
}

/// In-process backend for offline use and tests.
///
/// Listings are kept newest first. Every owner-scoped call resolves the caller
/// from the access token it issued, then checks ownership against that user.
#[derive(Default)]
pub struct MemoryBackend {
    listings: RwLock<Vec<Listing>>,
    images: RwLock<HashMap<String, ImageUpload>>,
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, String>>,
    next_id: AtomicU64,
    fail_uploads: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend preloaded with a handful of listings
    pub fn with_sample_data() -> Self {
        let backend = Self::new();
        {
            let mut listings = backend.listings.write().unwrap_or_else(PoisonError::into_inner);
            *listings = sample_listings();
        }
        backend
    }

    /// Make every subsequent image upload fail
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn listing_count(&self) -> usize {
        self.listings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn stored_image(&self, key: &str) -> Option<ImageUpload> {
        self.images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }

    fn issue_session(&self, user: User) -> Session {
        let token = self.next_id("token");
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), user.id.clone());
        Session {
            access_token: token,
            refresh_token: None,
            user,
        }
    }

    /// User the access token was issued to. The user carried in the session is not trusted.
    fn authenticated_user(&self, session: &Session) -> Result<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session.access_token)
            .cloned()
            .ok_or(Error::NotSignedIn)
    }

    /// Index of `id`, failing when it belongs to someone other than `user_id`
    fn owned_index(listings: &[Listing], user_id: &str, id: &str) -> Result<usize> {
        let index = listings
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if !listings[index].is_owned_by(user_id) {
            return Err(Error::NotOwner(id.to_string()));
        }
        Ok(index)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_available(&self) -> Result<Vec<Listing>> {
        let listings = self.listings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(listings.iter().filter(|l| l.is_available).cloned().collect())
    }

    async fn list_owned(&self, session: &Session) -> Result<Vec<Listing>> {
        let user_id = self.authenticated_user(session)?;
        let listings = self.listings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(listings
            .iter()
            .filter(|l| l.is_owned_by(&user_id))
            .cloned()
            .collect())
    }

    async fn insert_listing(&self, session: &Session, row: &ListingInsert) -> Result<Listing> {
        let user_id = self.authenticated_user(session)?;
        if row.owner_id != user_id {
            return Err(Error::NotOwner(row.owner_id.clone()));
        }

        let now = Utc::now();
        let form = row.form.clone();
        let listing = Listing {
            id: self.next_id("room"),
            title: form.title,
            description: form.description,
            location: form.location,
            city: form.city,
            rent_price: form.rent_price,
            property_type: form.property_type,
            tenant_preference: form.tenant_preference,
            image_url: row.image_url.clone(),
            owner_id: row.owner_id.clone(),
            owner_name: form.owner_name,
            owner_contact: form.owner_contact,
            owner_email: form.owner_email,
            created_at: now,
            updated_at: now,
            is_available: row.is_available,
        };

        self.listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, listing.clone());
        debug!(id = %listing.id, "Stored listing in memory");
        Ok(listing)
    }

    async fn set_availability(&self, session: &Session, id: &str, available: bool) -> Result<Listing> {
        let user_id = self.authenticated_user(session)?;
        let mut listings = self.listings.write().unwrap_or_else(PoisonError::into_inner);
        let index = Self::owned_index(&listings, &user_id, id)?;
        let listing = &mut listings[index];
        listing.is_available = available;
        listing.updated_at = Utc::now();
        Ok(listing.clone())
    }

    async fn delete_listing(&self, session: &Session, id: &str) -> Result<()> {
        let user_id = self.authenticated_user(session)?;
        let mut listings = self.listings.write().unwrap_or_else(PoisonError::into_inner);
        let index = Self::owned_index(&listings, &user_id, id)?;
        listings.remove(index);
        Ok(())
    }

    async fn upload_image(&self, session: &Session, key: &str, image: &ImageUpload) -> Result<()> {
        self.authenticated_user(session)?;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "storage unavailable".to_string(),
            });
        }

        let mut images = self.images.write().unwrap_or_else(PoisonError::into_inner);
        if images.contains_key(key) {
            return Err(Error::Api {
                status: 409,
                message: format!("object {} already exists", key),
            });
        }
        images.insert(key.to_string(), image.clone());
        Ok(())
    }

    fn public_image_url(&self, key: &str) -> String {
        format!("{}/{}", PUBLIC_BASE, key)
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Option<Session>> {
        let user = {
            let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(email) {
                return Err(Error::Api {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }

            let user = User {
                id: self.next_id("user"),
                email: Some(email.to_string()),
                user_metadata: UserMetadata {
                    name: Some(name.to_string()),
                },
            };
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    user: user.clone(),
                },
            );
            user
        };

        info!(email, "Registered in-memory account");
        Ok(Some(self.issue_session(user)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let user = {
            let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
            match accounts.get(email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    return Err(Error::Api {
                        status: 400,
                        message: "Invalid login credentials".to_string(),
                    })
                }
            }
        };
        Ok(self.issue_session(user))
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session.access_token);
        Ok(())
    }

    async fn current_user(&self, session: &Session) -> Result<User> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        match tokens.get(&session.access_token) {
            Some(user_id) if *user_id == session.user.id => Ok(session.user.clone()),
            _ => Err(Error::NotSignedIn),
        }
    }

    fn backend_name(&self) -> &'static str {
        "Memory"
    }
}

/// Sample listings, newest first
fn sample_listings() -> Vec<Listing> {
    let now = Utc::now();
    let sample = |n: i64,
                  title: &str,
                  location: &str,
                  city: &str,
                  rent: u32,
                  property_type: PropertyType,
                  tenant_preference: TenantPreference,
                  description: &str| {
        let at = now - Duration::hours(n);
        Listing {
            id: format!("sample-{}", n),
            title: title.to_string(),
            description: description.to_string(),
            location: location.to_string(),
            city: city.to_string(),
            rent_price: rent,
            property_type,
            tenant_preference,
            image_url: None,
            owner_id: "sample-owner".to_string(),
            owner_name: "Sample Owner".to_string(),
            owner_contact: "+91 98765 43210".to_string(),
            owner_email: "owner@example.com".to_string(),
            created_at: at,
            updated_at: at,
            is_available: true,
        }
    };

    vec![
        sample(
            1,
            "Spacious 2 BHK near FC Road",
            "FC Road, Shivajinagar",
            "Pune",
            15_000,
            PropertyType::TwoBhk,
            TenantPreference::Working,
            "Semi-furnished flat with balcony and covered parking.",
        ),
        sample(
            2,
            "Cosy single room for students",
            "Andheri West",
            "Mumbai",
            9_500,
            PropertyType::OneBed,
            TenantPreference::Bachelor,
            "Shared kitchen, five minutes from the metro.",
        ),
        sample(
            3,
            "Family home with garden",
            "Indiranagar",
            "Bangalore",
            32_000,
            PropertyType::ThreeBhk,
            TenantPreference::Family,
            "Quiet lane, schools and park nearby.",
        ),
        sample(
            4,
            "Girls PG in Koregaon Park",
            "Koregaon Park",
            "Pune",
            8_000,
            PropertyType::TwoBed,
            TenantPreference::Girls,
            "Meals included, 24x7 security.",
        ),
        sample(
            5,
            "Compact 1 BHK in Saket",
            "Saket",
            "Delhi",
            18_500,
            PropertyType::OneBhk,
            TenantPreference::Working,
            "Fully furnished, close to Malviya Nagar market.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewListing;

    fn insert_row(owner: &str) -> ListingInsert {
        ListingInsert {
            form: NewListing {
                title: "Room".into(),
                rent_price: 10_000,
                ..NewListing::default()
            },
            owner_id: owner.to_string(),
            image_url: None,
            is_available: true,
        }
    }

    #[tokio::test]
    async fn sample_data_is_newest_first() {
        let backend = MemoryBackend::with_sample_data();
        let listings = backend.list_available().await.unwrap();
        assert_eq!(listings.len(), 5);
        assert!(listings.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn new_listings_go_first() {
        let backend = MemoryBackend::with_sample_data();
        let session = backend.sign_up("a@example.com", "pw", "A").await.unwrap().unwrap();
        let created = backend
            .insert_listing(&session, &insert_row(session.user_id()))
            .await
            .unwrap();

        let listings = backend.list_available().await.unwrap();
        assert_eq!(listings[0].id, created.id);
        assert_eq!(backend.list_owned(&session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_mutation_by_other_owner() {
        let backend = MemoryBackend::with_sample_data();
        let session = backend.sign_up("a@example.com", "pw", "A").await.unwrap().unwrap();

        let err = backend.delete_listing(&session, "sample-1").await.unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
        let err = backend.set_availability(&session, "sample-1", false).await.unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
        let err = backend.delete_listing(&session, "missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = backend.insert_listing(&session, &insert_row("someone-else")).await.unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
        assert_eq!(backend.listing_count(), 5);
    }

    #[tokio::test]
    async fn unissued_token_is_rejected() {
        let backend = MemoryBackend::with_sample_data();
        let forged = Session {
            access_token: "never-issued".to_string(),
            refresh_token: None,
            user: User {
                id: "sample-owner".to_string(),
                email: None,
                user_metadata: UserMetadata::default(),
            },
        };

        let err = backend.delete_listing(&forged, "sample-1").await.unwrap_err();
        assert!(matches!(err, Error::NotSignedIn));
        let err = backend.set_availability(&forged, "sample-1", false).await.unwrap_err();
        assert!(matches!(err, Error::NotSignedIn));
        let err = backend.insert_listing(&forged, &insert_row("sample-owner")).await.unwrap_err();
        assert!(matches!(err, Error::NotSignedIn));
        assert!(matches!(backend.list_owned(&forged).await, Err(Error::NotSignedIn)));
        let image = ImageUpload::new("room.png", vec![1]);
        let err = backend.upload_image(&forged, "sample-owner/1.png", &image).await.unwrap_err();
        assert!(matches!(err, Error::NotSignedIn));

        assert_eq!(backend.listing_count(), 5);
        assert!(backend.stored_image("sample-owner/1.png").is_none());
    }

    #[tokio::test]
    async fn owner_comes_from_token_not_session_user() {
        let backend = MemoryBackend::with_sample_data();
        let mut session = backend.sign_up("a@example.com", "pw", "A").await.unwrap().unwrap();
        session.user.id = "sample-owner".to_string();

        let err = backend.delete_listing(&session, "sample-1").await.unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
        let err = backend.insert_listing(&session, &insert_row("sample-owner")).await.unwrap_err();
        assert!(matches!(err, Error::NotOwner(_)));
        assert!(backend.list_owned(&session).await.unwrap().is_empty());
        assert_eq!(backend.listing_count(), 5);
    }

    #[tokio::test]
    async fn unavailable_listings_are_hidden_from_browse() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("a@example.com", "pw", "A").await.unwrap().unwrap();
        let created = backend
            .insert_listing(&session, &insert_row(session.user_id()))
            .await
            .unwrap();

        backend.set_availability(&session, &created.id, false).await.unwrap();
        assert!(backend.list_available().await.unwrap().is_empty());
        assert_eq!(backend.list_owned(&session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn auth_round_trip() {
        let backend = MemoryBackend::new();
        backend.sign_up("a@example.com", "secret", "Asha").await.unwrap();

        assert!(backend.sign_in("a@example.com", "wrong").await.is_err());
        let session = backend.sign_in("a@example.com", "secret").await.unwrap();
        let user = backend.current_user(&session).await.unwrap();
        assert_eq!(user.display_name(), Some("Asha"));

        backend.sign_out(&session).await.unwrap();
        assert!(matches!(
            backend.current_user(&session).await,
            Err(Error::NotSignedIn)
        ));
        assert!(backend.sign_up("a@example.com", "x", "Dup").await.is_err());
    }
}
