//! Collaborators the render engine talks to and the data they exchange.
//!
//! The engine never cares whether stencils are rendered by the remote API
//! ([`crate::client::ApiClient`]) or offline ([`crate::local::LocalBackend`]);
//! it only sees these traits.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stencil registered in a formation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stencil {
    pub uid: String,
    pub filename: String,
}

/// A named collection of stencils, as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub stencils: Vec<Stencil>,
}

impl Formation {
    /// Resolves a stencil filename to its template identifier.
    pub fn resolve_template(&self, filename: &str) -> Option<&str> {
        self.stencils
            .iter()
            .find(|stencil| stencil.filename == filename)
            .map(|stencil| stencil.uid.as_str())
    }
}

/// Names one stencil of one formation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub formation: String,
    pub filename: String,
}

impl TemplateRef {
    pub fn new<F: Into<String>, N: Into<String>>(formation: F, filename: N) -> Self {
        Self {
            formation: formation.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.formation, self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub uid: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Error,
    Warning,
}

/// A message produced while rendering a stencil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub text: String,
    /// Stencil the message refers to; may be a partial included by the
    /// rendered stencil.
    pub stencil: String,
}

impl Diagnostic {
    pub fn error<T: Into<String>, S: Into<String>>(text: T, stencil: S) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            text: text.into(),
            stencil: stencil.into(),
        }
    }

    pub fn warning<T: Into<String>, S: Into<String>>(text: T, stencil: S) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            text: text.into(),
            stencil: stencil.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.text, self.stencil)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedStencil {
    pub content: String,
}

/// Response of a render call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renders {
    #[serde(default)]
    pub stencils: Vec<RenderedStencil>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl Renders {
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.of_kind(DiagnosticKind::Error)
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.of_kind(DiagnosticKind::Warning)
    }

    fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }
}

/// Everything a render call needs.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub stack: &'a str,
    pub snapshot: &'a str,
    pub formation: &'a str,
    pub stencil: &'a str,
    pub body: &'a [u8],
}

/// Renders a stencil body against a snapshot.
pub trait RenderingService {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Renders>;
}

/// Resolves formations and the stencils registered in them.
pub trait CatalogService {
    fn load_formation(&self, stack: &str, name: &str) -> Result<Formation>;
}

/// Lists snapshots of a stack, most recent first.
pub trait SnapshotService {
    fn list_snapshots(&self, stack: &str) -> Result<Vec<Snapshot>>;
}

/// A backend able to play all three roles.
pub trait Backend: RenderingService + CatalogService + SnapshotService {}

impl<T: RenderingService + CatalogService + SnapshotService> Backend for T {}
