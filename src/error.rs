//! Error types for kiji operations.

use thiserror::Error;

/// Errors that can occur while converting a JATS document.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Missing required element: {0}")]
    MissingElement(String),
}

pub type Result<T> = std::result::Result<T, Error>;
