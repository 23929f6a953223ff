//! Rendering a stencil file or a whole stencil folder.
//!
//! Every stencil goes through the same steps, in enumeration order:
//! read, fingerprint check against its previous render, render call, write.
//! A stencil that fails is reported and the rest of the batch carries on.

use crate::constants::{LATEST_SNAPSHOT, PAUSE_FILE};
use crate::error::{Error, Result};
use crate::fingerprint::{should_render, Fingerprint};
use crate::invoker::{is_private, Invoker, Outcome, RenderPolicy, SkipReason};
use crate::service::{Backend, Formation, SnapshotService, TemplateRef};
use crate::writer::{ensure_dir, print_rendered, render_filepath, write_rendered, Output};
use log::{debug, error, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a batch renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchTarget {
    File(PathBuf),
    Folder(PathBuf),
}

impl BatchTarget {
    /// Directory holding the pause marker for this target.
    pub fn watch_dir(&self) -> PathBuf {
        match self {
            BatchTarget::Folder(dir) => dir.clone(),
            BatchTarget::File(file) => match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Stencil files of this target.
    ///
    /// Folders are listed one level deep, sorted by name, without the pause
    /// marker and without partials. A file target must exist.
    pub fn enumerate(&self) -> Result<Vec<PathBuf>> {
        match self {
            BatchTarget::File(file) => {
                if !file.is_file() {
                    let message = format!("Cannot find {}", file.display());
                    return Err(Error::ConfigError(message));
                }
                Ok(vec![file.clone()])
            }
            BatchTarget::Folder(dir) => {
                let mut files = Vec::new();
                for entry in WalkDir::new(dir)
                    .min_depth(1)
                    .max_depth(1)
                    .follow_links(true)
                    .sort_by_file_name()
                {
                    let entry = entry.map_err(|e| Error::IoError(e.into()))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy();
                    if !is_stencil_name(&name) {
                        debug!("Not a stencil: {}", name);
                        continue;
                    }
                    files.push(entry.into_path());
                }
                Ok(files)
            }
        }
    }
}

impl fmt::Display for BatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchTarget::File(path) | BatchTarget::Folder(path) => {
                write!(f, "{}", path.display())
            }
        }
    }
}

/// True for names a batch renders: not the pause marker, not a partial.
pub fn is_stencil_name(name: &str) -> bool {
    name != PAUSE_FILE && !is_private(name)
}

/// Picks the snapshot to render against.
///
/// `None` and `"latest"` select the most recent snapshot of the stack.
pub fn resolve_snapshot(
    service: &dyn SnapshotService,
    stack: &str,
    requested: Option<&str>,
) -> Result<String> {
    match requested {
        Some(uid) if !uid.is_empty() && uid != LATEST_SNAPSHOT => Ok(uid.to_string()),
        _ => {
            let snapshots = service.list_snapshots(stack)?;
            let latest = snapshots
                .into_iter()
                .next()
                .ok_or_else(|| Error::NoSnapshots {
                    stack: stack.to_string(),
                })?;
            debug!("Using latest snapshot {}", latest.uid);
            Ok(latest.uid)
        }
    }
}

/// What happened to a single stencil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Written(PathBuf),
    Printed,
    Unchanged,
    Skipped(SkipReason),
    Suppressed,
    /// The service returned no content.
    Empty,
}

/// Counts of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub rendered: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub suppressed: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Written(_) | FileOutcome::Printed => self.rendered += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Skipped(_) | FileOutcome::Empty => self.skipped += 1,
            FileOutcome::Suppressed => self.suppressed += 1,
        }
    }
}

/// Renders stencils of one target against one formation and snapshot.
pub struct Batch<'a, B: Backend> {
    backend: &'a B,
    stack: String,
    formation: Formation,
    snapshot: String,
    target: BatchTarget,
    output: Output,
    policy: RenderPolicy,
}

impl<'a, B: Backend> Batch<'a, B> {
    pub fn new(
        backend: &'a B,
        stack: impl Into<String>,
        formation: Formation,
        snapshot: impl Into<String>,
        target: BatchTarget,
        output: Output,
        policy: RenderPolicy,
    ) -> Self {
        Self {
            backend,
            stack: stack.into(),
            formation,
            snapshot: snapshot.into(),
            target,
            output,
            policy,
        }
    }

    pub fn target(&self) -> &BatchTarget {
        &self.target
    }

    /// Fetches the formation again, picking up newly registered stencils.
    pub fn reload_formation(&mut self) -> Result<()> {
        self.formation = self
            .backend
            .load_formation(&self.stack, &self.formation.name)?;
        debug!(
            "Reloaded formation {} ({} stencils)",
            self.formation.name,
            self.formation.stencils.len()
        );
        Ok(())
    }

    /// Where the render of `stencil` goes.
    pub fn destination(&self, stencil: &Path) -> Output {
        match (&self.output, &self.target) {
            (Output::Stdout, _) => Output::Stdout,
            (Output::Path(dir), BatchTarget::Folder(_)) => {
                let name = stencil
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                Output::Path(render_filepath(dir, name))
            }
            (Output::Path(file), BatchTarget::File(_)) => Output::Path(file.clone()),
        }
    }

    /// Renders every stencil of the target.
    ///
    /// # Errors
    /// * `Error::NothingToRender` if the target has no stencils
    /// * Fatal errors only; per-stencil failures are counted in the report
    pub fn run(&self) -> Result<BatchReport> {
        self.prepare_output()?;

        let files = self.target.enumerate()?;
        if files.is_empty() {
            return Err(Error::NothingToRender);
        }

        let mut report = BatchReport::default();
        for file in &files {
            match self.render_file(file) {
                Ok(outcome) => report.record(&outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Failed to render {}: {}", file.display(), e);
                    report.failed += 1;
                }
            }
        }

        debug!("Batch finished: {:?}", report);
        Ok(report)
    }

    /// Renders a single stencil of the target.
    pub fn render_file(&self, stencil: &Path) -> Result<FileOutcome> {
        let name = stencil
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid stencil path {}", stencil.display()),
                ))
            })?
            .to_string();
        if is_private(&name) {
            return Ok(FileOutcome::Skipped(SkipReason::Private));
        }

        let body = fs::read(stencil)?;
        let destination = self.destination(stencil);
        let fingerprint = Fingerprint::of(&body);

        if let Output::Path(dest) = &destination {
            if !body.is_empty() && !should_render(&body, dest) {
                info!("No change found in {}", dest.display());
                return Ok(FileOutcome::Unchanged);
            }
            info!(
                "[{}] Rendering {} to {}",
                self.formation.name,
                stencil.display(),
                dest.display()
            );
        }

        let invoker = Invoker::new(self.backend, &self.stack, self.policy);
        let template = TemplateRef::new(self.formation.name.as_str(), name);
        let contents = match invoker.render(&self.formation, &template, &body, &self.snapshot)? {
            Outcome::Skipped(reason) => return Ok(FileOutcome::Skipped(reason)),
            Outcome::Suppressed { .. } => return Ok(FileOutcome::Suppressed),
            Outcome::Rendered { contents } => contents,
        };

        if contents.is_empty() {
            warn!("Nothing was rendered for {}", template);
            return Ok(FileOutcome::Empty);
        }

        match destination {
            Output::Path(dest) => {
                write_rendered(&dest, &contents, &fingerprint)?;
                Ok(FileOutcome::Written(dest))
            }
            Output::Stdout => {
                print_rendered(&mut std::io::stdout().lock(), &contents, &fingerprint)?;
                Ok(FileOutcome::Printed)
            }
        }
    }

    fn prepare_output(&self) -> Result<()> {
        match (&self.output, &self.target) {
            (Output::Stdout, _) => Ok(()),
            (Output::Path(dir), BatchTarget::Folder(_)) => ensure_dir(dir),
            (Output::Path(file), BatchTarget::File(_)) => match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
                _ => Ok(()),
            },
        }
    }
}
