#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;

use stencil_render::error::{Error, Result};
use stencil_render::service::{
    CatalogService, Diagnostic, Formation, RenderRequest, RenderedStencil, Renders,
    RenderingService, Snapshot, SnapshotService, Stencil,
};

/// In-memory backend recording every render call.
pub struct MockBackend {
    formation: RefCell<Formation>,
    snapshots: Vec<Snapshot>,
    responses: HashMap<String, Renders>,
    calls: RefCell<Vec<String>>,
    formation_loads: Cell<usize>,
}

impl MockBackend {
    pub fn new(filenames: &[&str]) -> Self {
        let stencils = filenames
            .iter()
            .map(|name| Stencil {
                uid: uid(name),
                filename: name.to_string(),
            })
            .collect();
        Self {
            formation: RefCell::new(Formation {
                uid: "fm-1".to_string(),
                name: "web".to_string(),
                stencils,
            }),
            snapshots: vec![
                Snapshot {
                    uid: "snap-new".to_string(),
                    created_at: None,
                },
                Snapshot {
                    uid: "snap-old".to_string(),
                    created_at: None,
                },
            ],
            responses: HashMap::new(),
            calls: RefCell::new(Vec::new()),
            formation_loads: Cell::new(0),
        }
    }

    pub fn without_snapshots(mut self) -> Self {
        self.snapshots.clear();
        self
    }

    /// Makes renders of `filename` answer with `diagnostics` and `contents`.
    pub fn respond(
        mut self,
        filename: &str,
        contents: &[&str],
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        self.responses.insert(
            uid(filename),
            Renders {
                stencils: contents
                    .iter()
                    .map(|content| RenderedStencil {
                        content: content.to_string(),
                    })
                    .collect(),
                diagnostics,
            },
        );
        self
    }

    /// Registers a stencil after the fact, like a stencil created remotely.
    pub fn register(&self, filename: &str) {
        self.formation.borrow_mut().stencils.push(Stencil {
            uid: uid(filename),
            filename: filename.to_string(),
        });
    }

    pub fn formation(&self) -> Formation {
        self.formation.borrow().clone()
    }

    pub fn render_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn rendered_stencils(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn formation_loads(&self) -> usize {
        self.formation_loads.get()
    }
}

pub fn uid(filename: &str) -> String {
    format!("uid-{filename}")
}

impl RenderingService for MockBackend {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Renders> {
        self.calls.borrow_mut().push(request.stencil.to_string());
        if let Some(renders) = self.responses.get(request.stencil) {
            return Ok(renders.clone());
        }
        Ok(Renders {
            stencils: vec![RenderedStencil {
                content: format!("rendered: {}", String::from_utf8_lossy(request.body)),
            }],
            diagnostics: Vec::new(),
        })
    }
}

impl CatalogService for MockBackend {
    fn load_formation(&self, _stack: &str, name: &str) -> Result<Formation> {
        self.formation_loads.set(self.formation_loads.get() + 1);
        let formation = self.formation.borrow();
        if formation.name != name {
            return Err(Error::FormationNotFound {
                name: name.to_string(),
            });
        }
        Ok(formation.clone())
    }
}

impl SnapshotService for MockBackend {
    fn list_snapshots(&self, _stack: &str) -> Result<Vec<Snapshot>> {
        Ok(self.snapshots.clone())
    }
}

pub fn write<P: AsRef<Path>>(path: P, content: &str) {
    std::fs::write(path, content).unwrap();
}

pub fn read<P: AsRef<Path>>(path: P) -> String {
    std::fs::read_to_string(path).unwrap()
}
