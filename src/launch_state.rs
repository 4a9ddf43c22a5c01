use parking_lot::RwLock;

use crate::desktop::WindowId;
use crate::model::{Application, Workspace};

/// Per-application progress through a reconciliation. Transitions are
/// monotonic; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Waiting,
    Launched,
    LaunchedAndMoved,
    Failed,
}

impl LaunchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LaunchState::LaunchedAndMoved | LaunchState::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            LaunchState::Waiting => 0,
            LaunchState::Launched => 1,
            LaunchState::LaunchedAndMoved => 2,
            LaunchState::Failed => 3,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    app: Application,
    state: LaunchState,
    window: Option<WindowId>,
}

impl Entry {
    fn can_advance_to(&self, state: LaunchState) -> bool {
        !self.state.is_terminal() && state.rank() > self.state.rank()
    }
}

/// Launch state of every application of a workspace, keyed by application
/// record identity and preserving workspace order. Readers run concurrently;
/// updates take the write lock.
pub struct LaunchStateMap {
    entries: RwLock<Vec<Entry>>,
}

impl LaunchStateMap {
    pub fn new(workspace: &Workspace) -> Self {
        let entries = workspace
            .apps
            .iter()
            .map(|app| Entry {
                app: app.clone(),
                state: LaunchState::Waiting,
                window: None,
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// State of the first entry matching the application record.
    pub fn get(&self, app: &Application) -> Option<LaunchState> {
        self.entries
            .read()
            .iter()
            .find(|e| e.app == *app)
            .map(|e| e.state)
    }

    /// First application (workspace order) currently in the given state.
    pub fn next(&self, state: LaunchState) -> Option<Application> {
        self.entries
            .read()
            .iter()
            .find(|e| e.state == state)
            .map(|e| e.app.clone())
    }

    /// Whether every application has reached a terminal state.
    pub fn all_launched_and_moved(&self) -> bool {
        self.entries.read().iter().all(|e| e.state.is_terminal())
    }

    /// Whether no other instance of the same program is still settling: an
    /// instance blocks while it has launched but its window has not been
    /// bound yet.
    pub fn all_instances_settled(&self, app: &Application) -> bool {
        !self
            .entries
            .read()
            .iter()
            .any(|e| e.app.same_program(app) && e.state == LaunchState::Launched)
    }

    /// Advance the first matching entry that can reach `state`. Regressions
    /// and updates to terminal entries are ignored.
    pub fn update(&self, app: &Application, state: LaunchState) {
        self.update_entry(app, None, state);
    }

    /// Like [`update`](Self::update), additionally binding the window handle.
    pub fn update_with_window(&self, app: &Application, window: WindowId, state: LaunchState) {
        self.update_entry(app, Some(window), state);
    }

    fn update_entry(&self, app: &Application, window: Option<WindowId>, state: LaunchState) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.app == *app && e.can_advance_to(state))
        {
            entry.state = state;
            if window.is_some() {
                entry.window = window;
            }
        }
    }

    /// Whether the window handle is already bound to some application.
    pub fn is_window_bound(&self, window: WindowId) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.window == Some(window))
    }

    /// Move every non-terminal entry to `Failed`.
    pub fn cancel(&self) {
        let mut entries = self.entries.write();
        for entry in entries.iter_mut() {
            if !entry.state.is_terminal() {
                entry.state = LaunchState::Failed;
            }
        }
    }

    /// Snapshot of all entries in workspace order.
    pub fn snapshot(&self) -> Vec<(Application, LaunchState, Option<WindowId>)> {
        self.entries
            .read()
            .iter()
            .map(|e| (e.app.clone(), e.state, e.window))
            .collect()
    }
}
