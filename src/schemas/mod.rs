use serde::Deserialize;

pub(crate) mod attempt;
pub(crate) mod auth;
pub(crate) mod exam;

/// Error body the portal backend attaches to every non-2xx response.
///
/// `code` is the machine-readable discriminator; the client never guesses a
/// failure class from the HTTP status alone when a code is present.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
    #[serde(default)]
    pub(crate) code: Option<String>,
}
