//! Calling the rendering service for one stencil and deciding whether its
//! output may be written.

use crate::constants::PRIVATE_PREFIX;
use crate::error::{Error, Result};
use crate::service::{Diagnostic, Formation, RenderRequest, Renders, RenderingService, TemplateRef};
use log::{debug, error, warn};

/// Whether diagnostics block the output of a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderPolicy {
    /// Write whatever was rendered even when errors were reported
    pub ignore_errors: bool,
    /// Write whatever was rendered even when warnings were reported
    pub ignore_warnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Private,
}

/// Result of rendering one stencil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was sent to the rendering service.
    Skipped(SkipReason),
    /// The service reported diagnostics the policy does not ignore.
    Suppressed { errors: usize, warnings: usize },
    /// Content that may be written, possibly empty.
    Rendered { contents: Vec<String> },
}

/// Returns true for partials, which are only ever included by other stencils.
pub fn is_private(filename: &str) -> bool {
    filename.starts_with(PRIVATE_PREFIX)
}

pub struct Invoker<'a> {
    service: &'a dyn RenderingService,
    stack: &'a str,
    policy: RenderPolicy,
}

impl<'a> Invoker<'a> {
    pub fn new(service: &'a dyn RenderingService, stack: &'a str, policy: RenderPolicy) -> Self {
        Self {
            service,
            stack,
            policy,
        }
    }

    /// Renders `body` as stencil `template` of `formation` against `snapshot`.
    ///
    /// # Errors
    /// * `Error::UnknownStencil` if the formation has no such stencil
    /// * Any error of the rendering service call itself
    pub fn render(
        &self,
        formation: &Formation,
        template: &TemplateRef,
        body: &[u8],
        snapshot: &str,
    ) -> Result<Outcome> {
        if is_private(&template.filename) {
            debug!("Skipping partial {}", template);
            return Ok(Outcome::Skipped(SkipReason::Private));
        }
        if body.is_empty() {
            warn!("File {} is empty", template.filename);
            return Ok(Outcome::Skipped(SkipReason::Empty));
        }

        let stencil = formation
            .resolve_template(&template.filename)
            .ok_or_else(|| Error::UnknownStencil {
                name: template.filename.clone(),
            })?;

        let request = RenderRequest {
            stack: self.stack,
            snapshot,
            formation: &formation.uid,
            stencil,
            body,
        };
        let renders = self.service.render(&request)?;

        Ok(self.triage(renders))
    }

    /// Reports every diagnostic and applies the policy, errors first.
    pub fn triage(&self, renders: Renders) -> Outcome {
        let errors = renders.errors();
        let warnings = renders.warnings();

        if !errors.is_empty() {
            report_errors(&errors);
        }
        if !warnings.is_empty() {
            report_warnings(&warnings);
        }

        let blocked_by_errors = !errors.is_empty() && !self.policy.ignore_errors;
        let blocked_by_warnings = !warnings.is_empty() && !self.policy.ignore_warnings;
        if blocked_by_errors || blocked_by_warnings {
            return Outcome::Suppressed {
                errors: errors.len(),
                warnings: warnings.len(),
            };
        }

        Outcome::Rendered {
            contents: renders.stencils.into_iter().map(|s| s.content).collect(),
        }
    }
}

fn report_errors(errors: &[&Diagnostic]) {
    error!("Error during rendering of stencils:");
    for diagnostic in errors {
        error!("\t{diagnostic}");
    }
}

fn report_warnings(warnings: &[&Diagnostic]) {
    warn!("Warning during rendering of stencils:");
    for diagnostic in warnings {
        warn!("\t{diagnostic}");
    }
}
