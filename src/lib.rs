//! stencil-render renders formation stencils through a rendering service and
//! keeps the rendered files up to date while the stencils are edited.
//! Rendered files carry a fingerprint of their stencil, so unchanged stencils
//! are never rendered twice.

/// Stencil folder and file batches
pub mod batch;

/// Command-line interface module
pub mod cli;

/// HTTP client for the formations API
pub mod client;

/// Project configuration (.cx.yml) and settings resolution
pub mod config;

/// Common constants
pub mod constants;

/// Error types and handling
pub mod error;

/// Content fingerprints and the magic comment carrying them
pub mod fingerprint;

/// Render calls and the error/warning policy
pub mod invoker;

/// Offline MiniJinja backend
pub mod local;

pub mod logger;

/// Rendering, catalog and snapshot service traits
pub mod service;

/// Watch loop with pause marker and debounced new files
pub mod watch;

/// Writing rendered output
pub mod writer;
