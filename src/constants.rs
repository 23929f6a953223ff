//! Common constants used throughout stencil-render.

use std::time::Duration;

/// Supported project configuration file names
pub const CONFIG_FILES: [&str; 3] = [".cx.yml", ".cx.yaml", ".cx.json"];

/// Presence of this file in a watched directory pauses rendering
pub const PAUSE_FILE: &str = ".pause";

/// Stencils starting with this prefix are partials and never rendered on their own
pub const PRIVATE_PREFIX: char = '_';

/// Scoping character in stencil filenames, replaced in rendered filenames
pub const COLLISION_CHAR: char = '@';

/// Replacement for [`COLLISION_CHAR`] in rendered filenames
pub const COLLISION_REPLACEMENT: &str = "-";

/// Leading marker of every magic comment in a rendered file
pub const MAGIC_COMMENT_PREFIX: &str = "# cx.";

/// Magic comment key carrying the source fingerprint
pub const CHECKSUM_KEY: &str = "checksum";

/// Separator between multiple rendered documents
pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Snapshot argument meaning "most recent"
pub const LATEST_SNAPSHOT: &str = "latest";

/// Wait before rendering a newly created stencil
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

/// Environment variable overriding the API token
pub const TOKEN_ENV: &str = "CX_TOKEN";

pub const DEFAULT_API_URL: &str = "https://app.cloud66.com/api/3/";
