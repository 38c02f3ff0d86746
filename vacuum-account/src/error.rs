//! Errors from the account HTTP client.

use std::fmt;

/// Any non-200 `code` field (or `success=false` on the Hawk-signed call)
/// yields this. Fatal to the current attempt; no retry is performed here —
/// the caller decides whether to retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for AccountError {}

/// Top-level error type for every [`crate::AccountClient`] call.
#[derive(Debug)]
pub enum Error {
    /// The account service rejected the request.
    Account(AccountError),
    /// Transport-level failure (DNS, TLS, connect, timeout, ...).
    Http(reqwest::Error),
    /// The response body didn't match the expected shape.
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(e) => write!(f, "{e}"),
            Self::Http(e) => write!(f, "http error: {e}"),
            Self::Decode(s) => write!(f, "decode error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self { Self::Http(e) }
}

impl From<AccountError> for Error {
    fn from(e: AccountError) -> Self { Self::Account(e) }
}
