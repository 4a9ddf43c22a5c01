use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, trace, warn};

use crate::apps_cache;
use crate::desktop::{place_window, Desktop, WindowId};
use crate::launch_state::{LaunchState, LaunchStateMap};
use crate::launcher::{self, ErrorAccumulator};
use crate::matcher::Matcher;
use crate::model::{MonitorSpec, Workspace};
use crate::pwa::PwaResolver;

pub const MAX_INSTANCE_WAIT_MS: u64 = 2000;
pub const POLL_MS: u64 = 50;
pub const INSTANCE_SETTLE_MS: u64 = 500;
pub const PHASE4_TIMEOUT_MS: u64 = 5000;
pub const MAX_MINIMIZE_WORKERS: usize = 4;

/// Wait and poll intervals of the reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub max_instance_wait: Duration,
    pub poll: Duration,
    pub instance_settle: Duration,
    pub phase4_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            max_instance_wait: Duration::from_millis(MAX_INSTANCE_WAIT_MS),
            poll: Duration::from_millis(POLL_MS),
            instance_settle: Duration::from_millis(INSTANCE_SETTLE_MS),
            phase4_timeout: Duration::from_millis(PHASE4_TIMEOUT_MS),
        }
    }
}

#[derive(Debug)]
pub struct ReconcileSummary {
    pub moved: usize,
    pub errors: Vec<(String, String)>,
}

/// Drives one workspace request through the four reconciliation phases:
/// minimize unmanaged windows, bind existing windows, launch missing
/// applications, capture the windows they open.
pub struct Reconciler<'a> {
    desktop: &'a dyn Desktop,
    timings: Timings,
}

impl<'a> Reconciler<'a> {
    pub fn new(desktop: &'a dyn Desktop) -> Self {
        Self {
            desktop,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(desktop: &'a dyn Desktop, timings: Timings) -> Self {
        Self { desktop, timings }
    }

    pub fn run(&self, workspace: &Workspace) -> ReconcileSummary {
        let started = Instant::now();
        info!("executing workspace sequence for: {}", workspace.name);

        let windows_before = self.desktop.list_windows().map(|w| w.len()).unwrap_or(0);
        let monitors = self.desktop.monitors();
        info!(
            "snapshot: {windows_before} windows, {} monitors, {} apps",
            monitors.len(),
            workspace.apps.len()
        );

        let state = LaunchStateMap::new(workspace);
        let errors = ErrorAccumulator::new();
        let pwa = PwaResolver::new();
        let matcher = Matcher::new(self.desktop, &pwa);
        let mut moved: Vec<WindowId> = Vec::new();

        let phase = Instant::now();
        info!("phase 1: minimizing unmanaged windows");
        self.minimize_unmanaged(workspace, &matcher, &moved);
        info!("minimization completed in {} ms", phase.elapsed().as_millis());

        let phase = Instant::now();
        info!("phase 2: moving existing windows");
        self.bind_existing(workspace, &matcher, &mut moved, &monitors, &errors);
        info!(
            "moved {} existing windows in {} ms",
            moved.len(),
            phase.elapsed().as_millis()
        );

        let phase = Instant::now();
        info!("phase 3: launching missing applications");
        self.launch_missing(&matcher, &state, &moved, &errors);
        info!(
            "application launch phase completed in {} ms",
            phase.elapsed().as_millis()
        );

        let phase = Instant::now();
        info!("phase 4: capturing newly launched windows");
        self.capture_new(&matcher, &state, &mut moved, &monitors, &errors);
        info!(
            "window capture phase completed in {} ms",
            phase.elapsed().as_millis()
        );

        let errors = errors.snapshot();
        if !errors.is_empty() {
            warn!("launch errors occurred: {} errors", errors.len());
            for (identifier, message) in &errors {
                error!("  {identifier}: {message}");
            }
        }
        info!(
            "workspace sequence completed in {} ms, total moved: {}",
            started.elapsed().as_millis(),
            moved.len()
        );

        ReconcileSummary {
            moved: moved.len(),
            errors,
        }
    }

    /// Phase 1. Windows belonging to any workspace application are never
    /// touched; the rest are minimized across a small pool of workers, since
    /// each minimize is a blocking OS round-trip.
    fn minimize_unmanaged(&self, workspace: &Workspace, matcher: &Matcher, moved: &[WindowId]) {
        let windows = match self.desktop.list_windows() {
            Ok(windows) => windows,
            Err(err) => {
                warn!("window enumeration failed: {err}");
                return;
            }
        };

        let mut unmanaged = Vec::new();
        let mut protected = 0usize;
        for window in windows {
            if moved.contains(&window) {
                continue;
            }
            if self.desktop.is_popup(window) {
                continue;
            }
            if matcher.matches_workspace(window, workspace) {
                trace!("window {window} protected as workspace app");
                protected += 1;
                continue;
            }
            unmanaged.push(window);
        }

        if unmanaged.is_empty() {
            info!("no unmanaged windows to minimize");
            return;
        }

        let workers = unmanaged.len().min(MAX_MINIMIZE_WORKERS);
        let chunk_len = unmanaged.len().div_ceil(workers);
        let minimized = AtomicUsize::new(0);
        let desktop = self.desktop;
        let minimized_ref = &minimized;
        thread::scope(|scope| {
            for slice in unmanaged.chunks(chunk_len) {
                scope.spawn(move || {
                    let mut local = 0;
                    for &window in slice {
                        if desktop.force_minimize(window) {
                            local += 1;
                        }
                    }
                    minimized_ref.fetch_add(local, Ordering::Relaxed);
                });
            }
        });

        info!(
            "window management: {} minimized, {protected} protected as workspace apps",
            minimized.load(Ordering::Relaxed)
        );
    }

    /// Phase 2. First matching window per application, in workspace order.
    fn bind_existing(
        &self,
        workspace: &Workspace,
        matcher: &Matcher,
        moved: &mut Vec<WindowId>,
        monitors: &[MonitorSpec],
        errors: &ErrorAccumulator,
    ) {
        let windows = match self.desktop.list_windows() {
            Ok(windows) => windows,
            Err(err) => {
                warn!("window enumeration failed: {err}");
                return;
            }
        };
        info!(
            "checking {} current windows for existing app matches",
            windows.len()
        );

        for app in &workspace.apps {
            for &window in &windows {
                if moved.contains(&window) {
                    continue;
                }
                if matcher.is_match(window, app) {
                    info!("found existing window for app: {}", app.name);
                    if place_window(self.desktop, monitors, window, app.position, app.target_state())
                    {
                        moved.push(window);
                    } else {
                        warn!("failed to move existing window for: {}", app.name);
                        errors.push(app.name.clone(), "failed to place existing window");
                    }
                    break;
                }
            }
        }
    }

    /// Phase 3. Applications already covered by a window moved in Phase 2 are
    /// bound; the rest are launched, serializing instances of the same
    /// program so slow starters are not raced against themselves.
    fn launch_missing(
        &self,
        matcher: &Matcher,
        state: &LaunchStateMap,
        moved: &[WindowId],
        errors: &ErrorAccumulator,
    ) {
        while let Some(app) = state.next(LaunchState::Waiting) {
            if let Some(&window) = moved
                .iter()
                .find(|&&w| !state.is_window_bound(w) && matcher.is_match(w, &app))
            {
                info!("application {} already has an arranged window", app.name);
                state.update_with_window(&app, window, LaunchState::LaunchedAndMoved);
                continue;
            }

            let wait_started = Instant::now();
            let mut waited = false;
            while !state.all_instances_settled(&app)
                && wait_started.elapsed() < self.timings.max_instance_wait
            {
                thread::sleep(self.timings.poll);
                waited = true;
            }
            if wait_started.elapsed() >= self.timings.max_instance_wait {
                info!("wait for launching next {} instance expired", app.name);
            }
            if waited {
                // Give the settling instance a moment even after binding.
                thread::sleep(self.timings.instance_settle);
            }

            let label = apps_cache::display_name(&app.app_user_model_id)
                .unwrap_or_else(|| app.name.clone());
            if launcher::launch(self.desktop, &app, errors) {
                info!("successfully launched {label}");
                state.update(&app, LaunchState::Launched);
            } else {
                error!("failed to launch {label}");
                state.update(&app, LaunchState::Failed);
            }
        }
    }

    /// Phase 4. Freshly spawned processes may briefly show several top-level
    /// windows; the candidate nearest to the target placement is bound.
    fn capture_new(
        &self,
        matcher: &Matcher,
        state: &LaunchStateMap,
        moved: &mut Vec<WindowId>,
        monitors: &[MonitorSpec],
        errors: &ErrorAccumulator,
    ) {
        let started = Instant::now();
        loop {
            if state.all_launched_and_moved() {
                info!("all applications launched and moved, finishing early");
                break;
            }
            if started.elapsed() >= self.timings.phase4_timeout {
                info!("window capture timeout reached");
                break;
            }

            let windows = self.desktop.list_windows().unwrap_or_default();
            let mut bound_one = false;
            for (app, app_state, _) in state.snapshot() {
                if app_state != LaunchState::Launched {
                    continue;
                }

                let candidates = windows.iter().copied().filter(|&w| {
                    !moved.contains(&w)
                        && !self.desktop.is_popup(w)
                        && !state.is_window_bound(w)
                        && matcher.is_match(w, &app)
                });
                let Some((window, distance)) = matcher.nearest(&app, candidates) else {
                    continue;
                };

                info!("found new window for app: {} (distance: {distance})", app.name);
                if place_window(self.desktop, monitors, window, app.position, app.target_state()) {
                    moved.push(window);
                    state.update_with_window(&app, window, LaunchState::LaunchedAndMoved);
                    bound_one = true;
                } else {
                    warn!("failed to move window for: {}", app.name);
                    errors.push(app.name.clone(), "failed to place newly captured window");
                    state.update_with_window(&app, window, LaunchState::Failed);
                }
            }

            if !bound_one {
                thread::sleep(self.timings.poll);
            }
        }
    }
}
