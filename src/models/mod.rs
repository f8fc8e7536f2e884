use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod session;

pub use session::{Session, User, UserMetadata};

/// Placeholder shown for listings uploaded without a photo
pub const DEFAULT_IMAGE_URL: &str =
    "https://images.pexels.com/photos/1457842/pexels-photo-1457842.jpeg?auto=compress&cs=tinysrgb&w=600";

/// Layout of the rented unit
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PropertyType {
    #[default]
    #[serde(rename = "1 BHK")]
    OneBhk,
    #[serde(rename = "2 BHK")]
    TwoBhk,
    #[serde(rename = "3 BHK")]
    ThreeBhk,
    #[serde(rename = "1 Bed")]
    OneBed,
    #[serde(rename = "2 Bed")]
    TwoBed,
    #[serde(rename = "3 Bed")]
    ThreeBed,
}

impl PropertyType {
    pub const ALL: [PropertyType; 6] = [
        PropertyType::OneBhk,
        PropertyType::TwoBhk,
        PropertyType::ThreeBhk,
        PropertyType::OneBed,
        PropertyType::TwoBed,
        PropertyType::ThreeBed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::OneBhk => "1 BHK",
            PropertyType::TwoBhk => "2 BHK",
            PropertyType::ThreeBhk => "3 BHK",
            PropertyType::OneBed => "1 Bed",
            PropertyType::TwoBed => "2 Bed",
            PropertyType::ThreeBed => "3 Bed",
        }
    }
}

/// Who the owner would like to rent to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TenantPreference {
    #[default]
    Bachelor,
    Family,
    Girls,
    Working,
}

impl TenantPreference {
    pub const ALL: [TenantPreference; 4] = [
        TenantPreference::Bachelor,
        TenantPreference::Family,
        TenantPreference::Girls,
        TenantPreference::Working,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantPreference::Bachelor => "Bachelor",
            TenantPreference::Family => "Family",
            TenantPreference::Girls => "Girls",
            TenantPreference::Working => "Working",
        }
    }
}

/// Error returned when a label does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! labelled_enum {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

labelled_enum!(PropertyType, "property type");
labelled_enum!(TenantPreference, "tenant preference");

/// A room listing as stored in the `rooms` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub city: String,
    pub rent_price: u32,
    pub property_type: PropertyType,
    pub tenant_preference: TenantPreference,
    pub image_url: Option<String>,
    pub owner_id: String,
    pub owner_name: String,
    pub owner_contact: String,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl Listing {
    /// Image to show on the card, falling back to the placeholder
    pub fn display_image(&self) -> &str {
        self.image_url.as_deref().unwrap_or(DEFAULT_IMAGE_URL)
    }

    /// Rent formatted for display, e.g. `₹15,000/mo`
    pub fn display_rent(&self) -> String {
        format!("₹{}/mo", group_thousands(self.rent_price))
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Listing creation form, before the owner and image are attached
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub location: String,
    pub city: String,
    pub rent_price: u32,
    pub property_type: PropertyType,
    pub tenant_preference: TenantPreference,
    pub owner_name: String,
    pub owner_contact: String,
    pub owner_email: String,
}

impl NewListing {
    /// Blank form prefilled with the signed-in user's name and email
    pub fn for_user(user: &User) -> Self {
        Self {
            owner_name: user.display_name().unwrap_or_default().to_string(),
            owner_email: user.email.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Names of required fields that were left blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("description", &self.description),
            ("location", &self.location),
            ("city", &self.city),
            ("owner_name", &self.owner_name),
            ("owner_contact", &self.owner_contact),
            ("owner_email", &self.owner_email),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Row sent to the backend on insert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingInsert {
    #[serde(flatten)]
    pub form: NewListing,
    pub owner_id: String,
    pub image_url: Option<String>,
    pub is_available: bool,
}

/// Image picked for upload alongside a new listing
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Everything after the last dot, or the whole name when there is none
    pub fn extension(&self) -> &str {
        self.file_name.rsplit('.').next().unwrap_or(&self.file_name)
    }

    /// Storage key `<owner>/<millis>.<ext>`
    pub fn storage_key(&self, owner_id: &str, at: DateTime<Utc>) -> String {
        format!("{}/{}.{}", owner_id, at.timestamp_millis(), self.extension())
    }
}
