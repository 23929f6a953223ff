//! Watching stencils and rendering them as they change.
//!
//! [`WatchController`] holds the watch state and turns filesystem events into
//! [`Action`]s; it never touches the filesystem and takes the current time as
//! an argument, so its behaviour is fully deterministic. [`watch`] wires a
//! controller to a `notify` watcher and a [`Pipeline`] that carries the
//! actions out.
//!
//! Creating `.pause` in the watched directory pauses the loop, removing it
//! resumes. Newly created stencils are rendered only after the debounce
//! interval has passed without further activity on them.

use crate::batch::{is_stencil_name, Batch, BatchTarget};
use crate::constants::PAUSE_FILE;
use crate::error::{Error, Result};
use crate::service::Backend;
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Active,
    Paused,
}

impl WatchState {
    /// Paused if `dir` holds the pause marker.
    pub fn detect(dir: &Path) -> Self {
        if dir.join(PAUSE_FILE).exists() {
            WatchState::Paused
        } else {
            WatchState::Active
        }
    }
}

/// Filesystem change, reduced to what the loop cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => {
                path
            }
        }
    }
}

/// Work the controller asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Render a known stencil.
    Render(PathBuf),
    /// Reload the catalog, then render a stencil seen for the first time.
    Onboard(PathBuf),
}

/// State machine behind the watch loop.
#[derive(Debug)]
pub struct WatchController {
    state: WatchState,
    debounce: Duration,
    /// Restricts the loop to a single stencil name.
    only: Option<String>,
    tracked: BTreeSet<PathBuf>,
    pending: IndexMap<PathBuf, Instant>,
}

impl WatchController {
    pub fn new(state: WatchState, debounce: Duration) -> Self {
        Self {
            state,
            debounce,
            only: None,
            tracked: BTreeSet::new(),
            pending: IndexMap::new(),
        }
    }

    /// Ignores every stencil except `name`.
    pub fn only(mut self, name: impl Into<String>) -> Self {
        self.only = Some(name.into());
        self
    }

    /// Marks stencils as already known.
    pub fn track<I: IntoIterator<Item = PathBuf>>(mut self, stencils: I) -> Self {
        self.tracked.extend(stencils);
        self
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn is_tracked(&self, stencil: &Path) -> bool {
        self.tracked.contains(stencil)
    }

    pub fn is_pending(&self, stencil: &Path) -> bool {
        self.pending.contains_key(stencil)
    }

    /// Earliest moment a debounced stencil becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn handle(&mut self, event: WatchEvent, now: Instant) -> Vec<Action> {
        let name = match event.path().file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => return Vec::new(),
        };

        if name == PAUSE_FILE {
            self.handle_pause_marker(&event);
            return Vec::new();
        }

        if self.state == WatchState::Paused {
            debug!("Paused, ignoring {:?}", event);
            return Vec::new();
        }

        if !self.accepts(&name) {
            debug!("Ignoring {:?}", event);
            return Vec::new();
        }

        match event {
            WatchEvent::Modified(path) => {
                if self.pending.contains_key(&path) {
                    self.pending.insert(path, now + self.debounce);
                    Vec::new()
                } else {
                    vec![Action::Render(path)]
                }
            }
            WatchEvent::Created(path) => {
                if self.tracked.contains(&path) {
                    return vec![Action::Render(path)];
                }
                if !self.pending.contains_key(&path) {
                    info!("New file {} found. Reloading stencil list", name);
                }
                self.pending.insert(path, now + self.debounce);
                Vec::new()
            }
            WatchEvent::Removed(path) => {
                self.pending.shift_remove(&path);
                if self.tracked.remove(&path) {
                    debug!("Stopped tracking {}", path.display());
                }
                Vec::new()
            }
        }
    }

    /// Collects the stencils whose debounce interval has passed.
    ///
    /// Stencils coming due while paused are dropped.
    pub fn due(&mut self, now: Instant) -> Vec<Action> {
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        let mut actions = Vec::new();
        for path in ready {
            self.pending.shift_remove(&path);
            if self.state == WatchState::Paused {
                debug!("Paused, dropping new file {}", path.display());
                continue;
            }
            self.tracked.insert(path.clone());
            actions.push(Action::Onboard(path));
        }
        actions
    }

    fn accepts(&self, name: &str) -> bool {
        match &self.only {
            Some(only) => only == name,
            None => is_stencil_name(name),
        }
    }

    fn handle_pause_marker(&mut self, event: &WatchEvent) {
        match (event, self.state) {
            (WatchEvent::Created(_), WatchState::Active) => {
                info!("Watch paused");
                self.state = WatchState::Paused;
            }
            (WatchEvent::Removed(_), WatchState::Paused) => {
                info!("Resuming watch...");
                self.state = WatchState::Active;
            }
            _ => {}
        }
    }
}

/// Carries out controller actions.
pub trait Pipeline {
    fn render(&mut self, stencil: &Path) -> Result<()>;
    fn onboard(&mut self, stencil: &Path) -> Result<()>;
}

impl<B: Backend> Pipeline for Batch<'_, B> {
    fn render(&mut self, stencil: &Path) -> Result<()> {
        self.render_file(stencil).map(|_| ())
    }

    fn onboard(&mut self, stencil: &Path) -> Result<()> {
        if let Err(e) = self.reload_formation() {
            warn!("Failed to reload formation: {}", e);
        }
        self.render_file(stencil).map(|_| ())
    }
}

/// Runs `actions` one after another; failures are reported, not returned.
pub fn dispatch<P: Pipeline>(pipeline: &mut P, actions: Vec<Action>) {
    for action in actions {
        let (stencil, result) = match action {
            Action::Render(stencil) => {
                let result = pipeline.render(&stencil);
                (stencil, result)
            }
            Action::Onboard(stencil) => {
                let result = pipeline.onboard(&stencil);
                (stencil, result)
            }
        };
        if let Err(e) = result {
            error!("Failed to render {}: {}", stencil.display(), e);
        }
    }
}

/// Maps a `notify` event onto watch events.
pub fn translate(event: notify::Event) -> Vec<WatchEvent> {
    let make: fn(PathBuf) -> WatchEvent = match event.kind {
        EventKind::Create(_) => WatchEvent::Created,
        EventKind::Remove(_) => WatchEvent::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut events = Vec::new();
            if let Some(from) = paths.next() {
                events.push(WatchEvent::Removed(from));
            }
            if let Some(to) = paths.next() {
                events.push(WatchEvent::Created(to));
            }
            return events;
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => WatchEvent::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => WatchEvent::Created,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => WatchEvent::Modified,
        _ => return Vec::new(),
    };
    event.paths.into_iter().map(make).collect()
}

/// Re-roots `path` under the watched directory so events and enumerated
/// stencils compare equal regardless of how the watcher spells paths.
fn normalize(dir: &Path, path: &Path) -> Option<PathBuf> {
    path.file_name().map(|name| dir.join(name))
}

fn normalize_event(dir: &Path, event: WatchEvent) -> Option<WatchEvent> {
    Some(match event {
        WatchEvent::Created(path) => WatchEvent::Created(normalize(dir, &path)?),
        WatchEvent::Modified(path) => WatchEvent::Modified(normalize(dir, &path)?),
        WatchEvent::Removed(path) => WatchEvent::Removed(normalize(dir, &path)?),
    })
}

/// Watches the batch target and renders changes until the process is
/// interrupted.
///
/// # Errors
/// * `Error::WatchError` if the watcher cannot be set up or reports a failure
pub fn watch<B: Backend>(batch: &mut Batch<'_, B>, debounce: Duration) -> Result<()> {
    let dir = batch.target().watch_dir();
    let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let initial = WatchState::detect(&dir);
    match initial {
        WatchState::Paused => info!("Watching is paused..."),
        WatchState::Active => info!("Watching for changes..."),
    }

    let known = batch.target().enumerate()?;
    let mut controller = WatchController::new(initial, debounce)
        .track(known.iter().filter_map(|stencil| normalize(&dir, stencil)));
    if let BatchTarget::File(file) = batch.target() {
        if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
            controller = controller.only(name);
        }
    }

    loop {
        let received = match controller.next_deadline() {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(event)) => {
                for event in translate(event) {
                    let event = match normalize_event(&dir, event) {
                        Some(event) => event,
                        None => continue,
                    };
                    let actions = controller.handle(event, Instant::now());
                    dispatch(batch, actions);
                }
            }
            Ok(Err(e)) => return Err(Error::WatchError(e)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::WatchError(notify::Error::generic("watcher stopped")));
            }
        }

        let actions = controller.due(Instant::now());
        dispatch(batch, actions);
    }
}
