//! Offline backend rendering stencils with MiniJinja.
//!
//! The stencil folder doubles as the catalog: every file in it is a stencil
//! whose identifier is its filename, and partials (`_name`) can be pulled in
//! with `{% include %}`. There is a single snapshot, [`LOCAL_SNAPSHOT`]. The
//! render context comes from a YAML or JSON file and always carries a `cx`
//! object describing the render (stack, formation, snapshot, stencil).
//!
//! Syntax and runtime errors are reported as error diagnostics. References to
//! undefined values are reported as warnings, and the stencil is rendered
//! again leniently so the warning can be ignored.

use crate::error::{Error, Result};
use crate::service::{
    CatalogService, Diagnostic, Formation, RenderRequest, RenderedStencil, Renders,
    RenderingService, Snapshot, SnapshotService, Stencil,
};
use indexmap::IndexMap;
use log::debug;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier of the only snapshot the local backend knows.
pub const LOCAL_SNAPSHOT: &str = "local";

/// Loads a render context, trying JSON first and YAML second.
///
/// # Errors
/// * `Error::IoError` if the file cannot be read
/// * `Error::ContextError` if it is neither JSON nor YAML, or not a mapping
pub fn load_context<P: AsRef<Path>>(path: P) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_context(&content)
}

pub fn parse_context(content: &str) -> Result<serde_json::Value> {
    let value: IndexMap<String, serde_json::Value> = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ContextError(format!("Invalid context format: {e}")))?,
    };
    Ok(serde_json::Value::Object(value.into_iter().collect()))
}

pub struct LocalBackend {
    env: Environment<'static>,
    stencil_dir: PathBuf,
    context: serde_json::Map<String, serde_json::Value>,
}

impl LocalBackend {
    pub fn new<P: AsRef<Path>>(stencil_dir: P, context: serde_json::Value) -> Self {
        let stencil_dir = stencil_dir.as_ref().to_path_buf();
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&stencil_dir));
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        let context = match context {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        Self {
            env,
            stencil_dir,
            context,
        }
    }

    fn context_for(&self, request: &RenderRequest<'_>) -> serde_json::Value {
        let mut context = self.context.clone();
        context.insert(
            "cx".to_string(),
            serde_json::json!({
                "stack": request.stack,
                "snapshot": request.snapshot,
                "formation": request.formation,
                "stencil": request.stencil,
            }),
        );
        serde_json::Value::Object(context)
    }
}

fn render_with(
    env: &Environment<'static>,
    name: &str,
    body: &str,
    context: &serde_json::Value,
) -> std::result::Result<String, minijinja::Error> {
    env.render_named_str(name, body, context)
}

fn diagnostic_source<'a>(err: &'a minijinja::Error, fallback: &'a str) -> &'a str {
    err.name().unwrap_or(fallback)
}

impl RenderingService for LocalBackend {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Renders> {
        let body = String::from_utf8_lossy(request.body);
        let context = self.context_for(request);
        let name = request.stencil;

        let renders = match render_with(&self.env, name, &body, &context) {
            Ok(content) => Renders {
                stencils: vec![RenderedStencil { content }],
                diagnostics: Vec::new(),
            },
            Err(e) if e.kind() == ErrorKind::UndefinedError => {
                let warning = Diagnostic::warning(e.to_string(), diagnostic_source(&e, name));
                let mut lenient = self.env.clone();
                lenient.set_undefined_behavior(UndefinedBehavior::Lenient);
                match render_with(&lenient, name, &body, &context) {
                    Ok(content) => Renders {
                        stencils: vec![RenderedStencil { content }],
                        diagnostics: vec![warning],
                    },
                    Err(e) => Renders {
                        stencils: Vec::new(),
                        diagnostics: vec![
                            warning,
                            Diagnostic::error(e.to_string(), diagnostic_source(&e, name)),
                        ],
                    },
                }
            }
            Err(e) => {
                let error = Diagnostic::error(e.to_string(), diagnostic_source(&e, name));
                Renders {
                    stencils: Vec::new(),
                    diagnostics: vec![error],
                }
            }
        };

        Ok(renders)
    }
}

impl CatalogService for LocalBackend {
    fn load_formation(&self, _stack: &str, name: &str) -> Result<Formation> {
        let mut stencils = Vec::new();
        for entry in fs::read_dir(&self.stencil_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(filename) = entry.file_name().to_str() {
                stencils.push(Stencil {
                    uid: filename.to_string(),
                    filename: filename.to_string(),
                });
            }
        }
        stencils.sort_by(|a, b| a.filename.cmp(&b.filename));
        debug!("Local formation {} has {} stencils", name, stencils.len());

        Ok(Formation {
            uid: name.to_string(),
            name: name.to_string(),
            stencils,
        })
    }
}

impl SnapshotService for LocalBackend {
    fn list_snapshots(&self, _stack: &str) -> Result<Vec<Snapshot>> {
        Ok(vec![Snapshot {
            uid: LOCAL_SNAPSHOT.to_string(),
            created_at: None,
        }])
    }
}
