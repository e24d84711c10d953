use quick_xml::Error as XMLError;
use std::{str::Utf8Error, string::FromUtf8Error};
use thiserror::Error;

/// Wrapper around `std::Result`
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    /// [`std::io`] related error.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// Decoding related error.
    /// Maybe the XML declaration has an encoding value that it doesn't recognize,
    /// or it doesn't match its actual encoding,
    #[error("Cannot decode XML")]
    CannotDecode,
    /// Assorted errors while parsing XML.
    #[error("Malformed XML: {0}")]
    MalformedXML(String),
    /// A source, target or fragment value of a kind that can't be used.
    #[error("Unexpected type: {0}")]
    TypeMismatch(String),
    /// Feeds can only be read from local files.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    /// The feed root has no `<channel>` element.
    #[error("Feed has no channel element")]
    MissingChannel,
    /// The container element cannot have a parent.
    /// Use `element.is_container()` to check if it is a container before
    /// assigning it to another parent.
    #[error("Container element cannot move")]
    ContainerCannotMove,
    /// You need to call `element.detach()` before assigning another parent.
    #[error("Element already has a parent. Call detach() before changing parent.")]
    HasAParent,
    /// Element was not found among the children.
    #[error("Element not found")]
    NotFound,
}

impl From<XMLError> for Error {
    fn from(err: XMLError) -> Error {
        match err {
            XMLError::EndEventMismatch { expected, found } => Error::MalformedXML(format!(
                "Closing tag mismatch. Expected {}, found {}",
                expected, found,
            )),
            XMLError::Io(err) => Error::Io(err),
            XMLError::Utf8(_) => Error::CannotDecode,
            err => Error::MalformedXML(err.to_string()),
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_: FromUtf8Error) -> Error {
        Error::CannotDecode
    }
}

impl From<Utf8Error> for Error {
    fn from(_: Utf8Error) -> Error {
        Error::CannotDecode
    }
}
