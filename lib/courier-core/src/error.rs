//! Error types for courier.

use derive_more::{Display, Error, From};

/// Which half of an exchange a body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Direction {
    /// Outgoing request body.
    #[display("request")]
    Request,
    /// Incoming response body.
    #[display("response")]
    Response,
}

/// Main error type for courier operations.
///
/// A non-2xx HTTP response is *not* an error: the pipeline hands every
/// obtained response back to the caller untouched. Errors only describe
/// exchanges that produced no usable response.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// A failure passed up through one decorator.
    ///
    /// Displays exactly as its inner error, so the rendered message of a
    /// deeply decorated failure stays the root cause message. The inner
    /// error is exposed via [`std::error::Error::source`].
    #[display("{_0}")]
    #[from(skip)]
    Wrapped(Box<Error>),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// The request deadline elapsed.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The request was canceled.
    #[display("request canceled")]
    #[from(skip)]
    Canceled,

    /// A body could not be drained for capture.
    #[display("cannot read {direction} data: {source}")]
    #[from(skip)]
    BodyRead {
        /// Which body failed to read.
        direction: Direction,
        /// Underlying failure.
        source: Box<Error>,
    },

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a failure crossing one decorator boundary.
    ///
    /// Each decorator wraps exactly once, so the nesting depth of a failure
    /// equals the number of decorators it crossed.
    #[must_use]
    pub fn wrapped(inner: Self) -> Self {
        Self::Wrapped(Box::new(inner))
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a body-read error for the given direction.
    #[must_use]
    pub fn body_read(direction: Direction, source: Self) -> Self {
        Self::BodyRead {
            direction,
            source: Box::new(source),
        }
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Peel off every [`Error::Wrapped`] level and return the original failure.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::Wrapped(inner) = current {
            current = inner;
        }
        current
    }

    /// Returns `true` if the root cause is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::Timeout)
    }

    /// Returns `true` if the root cause is a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self.root_cause(), Self::Canceled)
    }

    /// Returns `true` if the root cause is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self.root_cause(), Self::Connection(_))
    }
}
