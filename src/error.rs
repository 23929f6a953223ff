//! Error handling for stencil-render.
//! Defines the error type and result alias used throughout the crate.

use std::io;
use thiserror::Error;

/// Error types for rendering and watching stencils.
///
/// Setup and configuration problems end the process (see [`Error::is_fatal`]),
/// everything else is reported against the single stencil it happened to.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Invalid or missing configuration (flags, config file)
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    #[error("No snapshots found for stack '{stack}'.")]
    NoSnapshots { stack: String },

    #[error("No files found to render.")]
    NothingToRender,

    #[error("No formation named '{name}' found.")]
    FormationNotFound { name: String },

    /// The catalog has no stencil with this filename
    #[error(
        "No stencil named '{name}' found. If this is a new stencil, you can try again once it's fully created in the formation in a few seconds."
    )]
    UnknownStencil { name: String },

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}.")]
    ApiError { status: u16, message: String },

    #[error("HTTP error: {0}.")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}.")]
    UrlError(#[from] url::ParseError),

    #[error("Watch error: {0}.")]
    WatchError(#[from] notify::Error),

    #[error("Template error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    /// The render context file could not be parsed
    #[error("Context error: {0}.")]
    ContextError(String),
}

impl Error {
    /// Whether this error should end the whole operation rather than a single
    /// stencil's render.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigError(_)
                | Error::NoSnapshots { .. }
                | Error::NothingToRender
                | Error::FormationNotFound { .. }
                | Error::UrlError(_)
                | Error::WatchError(_)
                | Error::ContextError(_)
        )
    }
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(1);
}
