use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("you must be signed in to do that")]
    NotSignedIn,

    #[error("listing {0} belongs to another owner")]
    NotOwner(String),

    #[error("listing {0} not found")]
    NotFound(String),

    #[error("invalid listing: {0}")]
    Validation(String),

    #[error("deletion of listing {0} was not confirmed")]
    NotConfirmed(String),

    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-initiated operations, used to phrase failures for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchRooms,
    AddRoom,
    UpdateRoom,
    DeleteRoom,
    SignIn,
    SignUp,
    SignOut,
    CheckSession,
}

impl Operation {
    /// Generic message shown in place of the underlying error
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::FetchRooms => "Failed to load rooms. Please try again.",
            Operation::AddRoom => "Failed to add room. Please try again.",
            Operation::UpdateRoom => "Failed to update room. Please try again.",
            Operation::DeleteRoom => "Failed to delete room. Please try again.",
            Operation::SignIn => "Failed to sign in. Please try again.",
            Operation::SignUp => "Failed to create account. Please try again.",
            Operation::SignOut => "Failed to sign out. Please try again.",
            Operation::CheckSession => "Failed to check your sign-in. Please log in again.",
        }
    }
}
