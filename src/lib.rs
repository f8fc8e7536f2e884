//! Room rental marketplace client.
//!
//! Browse and filter available rooms, and manage your own listings, against a
//! hosted database/auth/storage backend or an in-memory one.

pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod service;
pub mod session_store;

pub use error::{Error, Operation, Result};
pub use filter::{apply_filters, FilterCriteria, Selector};
pub use models::{Listing, NewListing, PropertyType, TenantPreference};
pub use service::Marketplace;
