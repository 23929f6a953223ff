//! Content fingerprints and the magic comment that carries them.
//!
//! Every rendered file starts with a line like
//!
//! ```text
//! # cx.checksum: 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! ```
//!
//! which records the fingerprint of the stencil it was rendered from. A stencil
//! whose fingerprint matches the one in its rendered file does not need to be
//! rendered again.

use crate::constants::{CHECKSUM_KEY, MAGIC_COMMENT_PREFIX};
use log::debug;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

/// SHA-256 digest of a stencil body, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(body: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(body)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The magic comment line embedding this fingerprint, newline included.
    pub fn magic_comment(&self) -> String {
        format!("{MAGIC_COMMENT_PREFIX}{CHECKSUM_KEY}: {}\n", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First magic comment of a line: key, then the value token.
static MAGIC_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    let prefix = regex::escape(MAGIC_COMMENT_PREFIX);
    Regex::new(&format!(r"^\s*{prefix}([A-Za-z0-9_]+):\s*(\S+)")).unwrap()
});

/// Extracts the value of magic comment `key` from a single line.
///
/// Leading whitespace and anything after the value token are ignored, so a
/// line such as `# cx.checksum: abc cx.rendered_by: ci` still yields `abc`.
pub fn parse_magic_comment(line: &str, key: &str) -> Option<String> {
    let caps = MAGIC_COMMENT_RE.captures(line)?;
    if &caps[1] != key {
        return None;
    }
    Some(caps[2].to_string())
}

/// Reads magic comment `key` from the first line of `path`.
///
/// A missing or unreadable file, or a first line without the comment, yields
/// `None`.
pub fn read_magic_comment<P: AsRef<Path>>(path: P, key: &str) -> Option<String> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!("No previous render at {}: {}", path.display(), e);
            return None;
        }
    };

    let mut first_line = String::new();
    if let Err(e) = BufReader::new(file).read_line(&mut first_line) {
        debug!("Failed to read {}: {}", path.display(), e);
        return None;
    }

    parse_magic_comment(&first_line, key)
}

/// Fingerprint embedded in a previously rendered file, if any.
pub fn read_fingerprint<P: AsRef<Path>>(path: P) -> Option<Fingerprint> {
    read_magic_comment(path, CHECKSUM_KEY).map(Fingerprint)
}

/// Decides whether `body` has to be rendered into `existing_output`.
///
/// Returns `false` only when the output already carries the fingerprint of
/// `body`.
pub fn should_render<P: AsRef<Path>>(body: &[u8], existing_output: P) -> bool {
    match read_fingerprint(existing_output) {
        Some(existing) => existing != Fingerprint::of(body),
        None => true,
    }
}
