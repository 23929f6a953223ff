//! Writing rendered stencils to disk or stdout.

use crate::constants::{COLLISION_CHAR, COLLISION_REPLACEMENT, DOCUMENT_SEPARATOR};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use log::debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where rendered content goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A single file (single stencil) or a directory (stencil folder).
    Path(PathBuf),
    /// Rendered documents are printed one after another.
    Stdout,
}

impl Output {
    pub fn from_option(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Output::Path(path),
            None => Output::Stdout,
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, Output::Stdout)
    }
}

/// Returns the rendered file path for a stencil inside `outdir`.
///
/// The collision character is replaced so rendered files never carry the
/// name of the stencil they came from, which keeps them from being committed
/// back as stencils by mistake.
pub fn render_filepath<P: AsRef<Path>>(outdir: P, stencil_filename: &str) -> PathBuf {
    let basename = Path::new(stencil_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(stencil_filename);
    let render_filename = basename.replace(COLLISION_CHAR, COLLISION_REPLACEMENT);
    outdir.as_ref().join(render_filename)
}

/// Magic comment followed by the rendered documents.
pub fn stamp(contents: &[String], fingerprint: &Fingerprint) -> String {
    let mut stamped = fingerprint.magic_comment();
    for (idx, content) in contents.iter().enumerate() {
        if idx > 0 {
            if !stamped.ends_with('\n') {
                stamped.push('\n');
            }
            stamped.push_str(DOCUMENT_SEPARATOR);
        }
        stamped.push_str(content);
    }
    stamped
}

/// Creates `dir` and its parents if needed.
pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    fs::create_dir_all(dir.as_ref()).map_err(Error::IoError)
}

/// Writes the stamped contents to `dest`.
///
/// The content goes to a temporary file next to `dest` first and is renamed
/// into place, so a failed write leaves any previous render untouched.
pub fn write_rendered<P: AsRef<Path>>(
    dest: P,
    contents: &[String],
    fingerprint: &Fingerprint,
) -> Result<()> {
    let dest = dest.as_ref();
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(stamp(contents, fingerprint).as_bytes())?;
    tmp.as_file().sync_all()?;
    set_readable(tmp.path())?;
    tmp.persist(dest).map_err(|e| Error::IoError(e.error))?;

    debug!("Wrote {}", dest.display());
    Ok(())
}

/// Prints each stamped document followed by a separator.
pub fn print_rendered<W: Write>(
    out: &mut W,
    contents: &[String],
    fingerprint: &Fingerprint,
) -> Result<()> {
    for content in contents {
        let stamped = stamp(std::slice::from_ref(content), fingerprint);
        out.write_all(stamped.as_bytes())?;
        if !stamped.ends_with('\n') {
            out.write_all(b"\n")?;
        }
        out.write_all(DOCUMENT_SEPARATOR.as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(unix)]
fn set_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_readable(_path: &Path) -> Result<()> {
    Ok(())
}
