use std::fmt;

use anyhow::Result;

use crate::model::{MonitorSpec, Rect, WindowState};

/// Opaque top-level window handle. The engine only compares these; the OS
/// representation never leaks past the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub isize);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Metadata of an installed application, as reported by the OS.
#[derive(Debug, Clone)]
pub struct InstalledApp {
    pub aumid: String,
    pub display_name: String,
}

/// Surface of the host windowing environment consumed by the engine.
///
/// Everything the reconciliation touches on the OS goes through here, which
/// keeps the engine free of Win32 types and drivable by the simulated
/// desktop in tests.
pub trait Desktop: Send + Sync {
    /// Enumerate top-level windows passing the standard visibility/role
    /// filter, in OS enumeration order.
    fn list_windows(&self) -> Result<Vec<WindowId>>;

    /// Whether the window is a system popup that must never be touched.
    fn is_popup(&self, window: WindowId) -> bool;

    /// Full path of the window's owning process executable.
    fn process_path(&self, window: WindowId) -> Option<String>;

    /// Application-user-model id presented by the window's process, if any.
    fn window_aumid(&self, window: WindowId) -> Option<String>;

    fn window_state(&self, window: WindowId) -> WindowState;

    fn window_rect(&self, window: WindowId) -> Option<Rect>;

    /// Current monitor topology with device and work-area rectangles.
    fn monitors(&self) -> Vec<MonitorSpec>;

    /// Minimize without animation. Returns false on OS failure.
    fn force_minimize(&self, window: WindowId) -> bool;

    /// Make the window visible without activating it.
    fn show_no_activate(&self, window: WindowId);

    /// Batched move/resize that keeps z-order and activation untouched.
    fn set_window_pos(&self, window: WindowId, rect: Rect) -> bool;

    fn maximize(&self, window: WindowId) -> bool;

    /// Start a process. Uses the fast non-elevated creation path when
    /// possible, otherwise the shell-execute path (the only one supporting
    /// elevation).
    fn spawn(&self, path: &str, args: &str, cwd: &str, elevated: bool) -> Result<()>;

    /// Launch a packaged application by full package name; blocks until the
    /// launch verb completes.
    fn launch_packaged(&self, package_full_name: &str) -> Result<()>;

    /// Launch via the shell apps-folder using an application-user-model id.
    fn launch_shell_aumid(&self, aumid: &str, args: &str, elevated: bool) -> Result<()>;

    fn file_exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    /// Snapshot of installed applications, used to warm the apps cache.
    fn installed_apps(&self) -> Vec<InstalledApp> {
        Vec::new()
    }
}

/// Pick the monitor whose work area contains the rectangle's top-left corner,
/// falling back to the primary (device origin 0,0) and then to the first.
fn containing_monitor<'a>(monitors: &'a [MonitorSpec], target: &Rect) -> Option<&'a MonitorSpec> {
    monitors
        .iter()
        .find(|m| m.work.contains_point(target.left(), target.top()))
        .or_else(|| monitors.iter().find(|m| m.device.x == 0 && m.device.y == 0))
        .or_else(|| monitors.first())
}

/// Apply a target placement to a window.
///
/// `target` is in screen coordinates of the monitor device rectangle; for
/// non-minimized states it is translated into work-area coordinates of the
/// containing monitor before the position is applied. Returns false on any
/// OS failure.
pub fn place_window(
    desktop: &dyn Desktop,
    monitors: &[MonitorSpec],
    window: WindowId,
    target: Rect,
    state: WindowState,
) -> bool {
    if state == WindowState::Minimized {
        return desktop.force_minimize(window);
    }

    let mut rect = target;
    if let Some(monitor) = containing_monitor(monitors, &target) {
        let (dx, dy) = monitor.work_offset();
        rect.x -= dx;
        rect.y -= dy;
    }

    desktop.show_no_activate(window);
    if !desktop.set_window_pos(window, rect) {
        return false;
    }

    if state == WindowState::Maximized {
        return desktop.maximize(window);
    }
    true
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};

    use anyhow::{bail, Result};
    use parking_lot::Mutex;

    use super::{Desktop, InstalledApp, WindowId};
    use crate::model::{MonitorSpec, Rect, WindowState};

    /// One OS side effect, recorded in the order it was issued.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Effect {
        Minimize(WindowId),
        ShowNoActivate(WindowId),
        SetPos(WindowId, Rect),
        Maximize(WindowId),
        Spawn(String, String),
        LaunchPackaged(String),
        LaunchAumid(String),
    }

    #[derive(Debug, Clone)]
    pub struct FakeWindow {
        pub id: WindowId,
        pub path: String,
        pub aumid: String,
        pub state: WindowState,
        pub rect: Rect,
        pub popup: bool,
    }

    #[derive(Default)]
    struct State {
        windows: Vec<FakeWindow>,
        monitors: Vec<MonitorSpec>,
        effects: Vec<Effect>,
        spawn_templates: HashMap<String, FakeWindow>,
        aumid_templates: HashMap<String, FakeWindow>,
        files: HashSet<String>,
        installed: Vec<InstalledApp>,
        fail_set_pos: HashSet<WindowId>,
        fail_aumid_launch: bool,
        fail_packaged_launch: bool,
        next_id: isize,
    }

    /// Simulated desktop: windows and monitors are plain data, every
    /// placement call is recorded, and launches materialize new windows from
    /// registered templates.
    #[derive(Default)]
    pub struct FakeDesktop {
        state: Mutex<State>,
    }

    impl FakeDesktop {
        pub fn new() -> Self {
            let fake = Self::default();
            fake.state.lock().monitors = vec![MonitorSpec {
                id: "m0".into(),
                device: Rect::new(0, 0, 1920, 1080),
                work: Rect::new(0, 0, 1920, 1080),
            }];
            fake
        }

        pub fn set_monitors(&self, monitors: Vec<MonitorSpec>) {
            self.state.lock().monitors = monitors;
        }

        pub fn add_window(&self, path: &str, aumid: &str, rect: Rect) -> WindowId {
            let mut st = self.state.lock();
            st.next_id += 1;
            let id = WindowId(st.next_id);
            st.windows.push(FakeWindow {
                id,
                path: path.to_string(),
                aumid: aumid.to_string(),
                state: WindowState::Normal,
                rect,
                popup: false,
            });
            id
        }

        pub fn add_popup(&self, path: &str) -> WindowId {
            let id = self.add_window(path, "", Rect::new(0, 0, 100, 100));
            let mut st = self.state.lock();
            st.windows.iter_mut().find(|w| w.id == id).unwrap().popup = true;
            id
        }

        /// Register an executable so `file_exists` sees it and `spawn`
        /// produces a window with the given attributes.
        pub fn register_executable(&self, path: &str, aumid: &str, rect: Rect) {
            let mut st = self.state.lock();
            st.files.insert(path.to_lowercase());
            st.spawn_templates.insert(
                path.to_lowercase(),
                FakeWindow {
                    id: WindowId(0),
                    path: path.to_string(),
                    aumid: aumid.to_string(),
                    state: WindowState::Normal,
                    rect,
                    popup: false,
                },
            );
        }

        pub fn register_file(&self, path: &str) {
            self.state.lock().files.insert(path.to_lowercase());
        }

        /// Register a window template produced by a shell-AUMID launch.
        pub fn register_aumid(&self, aumid: &str, path: &str, rect: Rect) {
            let mut st = self.state.lock();
            st.aumid_templates.insert(
                aumid.to_string(),
                FakeWindow {
                    id: WindowId(0),
                    path: path.to_string(),
                    aumid: aumid.to_string(),
                    state: WindowState::Normal,
                    rect,
                    popup: false,
                },
            );
        }

        pub fn set_installed(&self, apps: Vec<InstalledApp>) {
            self.state.lock().installed = apps;
        }

        pub fn fail_set_pos(&self, window: WindowId) {
            self.state.lock().fail_set_pos.insert(window);
        }

        pub fn fail_aumid_launches(&self) {
            self.state.lock().fail_aumid_launch = true;
        }

        pub fn fail_packaged_launches(&self) {
            self.state.lock().fail_packaged_launch = true;
        }

        pub fn effects(&self) -> Vec<Effect> {
            self.state.lock().effects.clone()
        }

        pub fn clear_effects(&self) {
            self.state.lock().effects.clear();
        }

        pub fn window(&self, id: WindowId) -> Option<FakeWindow> {
            self.state.lock().windows.iter().find(|w| w.id == id).cloned()
        }

        pub fn spawned_count(&self) -> usize {
            self.state
                .lock()
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::Spawn(..)))
                .count()
        }

        fn materialize(st: &mut State, template_key: &str, by_aumid: bool) {
            let template = if by_aumid {
                st.aumid_templates.get(template_key).cloned()
            } else {
                st.spawn_templates.get(template_key).cloned()
            };
            if let Some(mut win) = template {
                st.next_id += 1;
                win.id = WindowId(st.next_id);
                st.windows.push(win);
            }
        }
    }

    impl Desktop for FakeDesktop {
        fn list_windows(&self) -> Result<Vec<WindowId>> {
            Ok(self.state.lock().windows.iter().map(|w| w.id).collect())
        }

        fn is_popup(&self, window: WindowId) -> bool {
            self.state
                .lock()
                .windows
                .iter()
                .any(|w| w.id == window && w.popup)
        }

        fn process_path(&self, window: WindowId) -> Option<String> {
            self.state
                .lock()
                .windows
                .iter()
                .find(|w| w.id == window)
                .map(|w| w.path.clone())
        }

        fn window_aumid(&self, window: WindowId) -> Option<String> {
            self.state
                .lock()
                .windows
                .iter()
                .find(|w| w.id == window)
                .map(|w| w.aumid.clone())
                .filter(|a| !a.is_empty())
        }

        fn window_state(&self, window: WindowId) -> WindowState {
            self.state
                .lock()
                .windows
                .iter()
                .find(|w| w.id == window)
                .map(|w| w.state)
                .unwrap_or_default()
        }

        fn window_rect(&self, window: WindowId) -> Option<Rect> {
            self.state
                .lock()
                .windows
                .iter()
                .find(|w| w.id == window)
                .map(|w| w.rect)
        }

        fn monitors(&self) -> Vec<MonitorSpec> {
            self.state.lock().monitors.clone()
        }

        fn force_minimize(&self, window: WindowId) -> bool {
            let mut st = self.state.lock();
            st.effects.push(Effect::Minimize(window));
            if let Some(w) = st.windows.iter_mut().find(|w| w.id == window) {
                w.state = WindowState::Minimized;
                true
            } else {
                false
            }
        }

        fn show_no_activate(&self, window: WindowId) {
            self.state.lock().effects.push(Effect::ShowNoActivate(window));
        }

        fn set_window_pos(&self, window: WindowId, rect: Rect) -> bool {
            let mut st = self.state.lock();
            st.effects.push(Effect::SetPos(window, rect));
            if st.fail_set_pos.contains(&window) {
                return false;
            }
            if let Some(w) = st.windows.iter_mut().find(|w| w.id == window) {
                w.rect = rect;
                w.state = WindowState::Normal;
                true
            } else {
                false
            }
        }

        fn maximize(&self, window: WindowId) -> bool {
            let mut st = self.state.lock();
            st.effects.push(Effect::Maximize(window));
            if let Some(w) = st.windows.iter_mut().find(|w| w.id == window) {
                w.state = WindowState::Maximized;
                true
            } else {
                false
            }
        }

        fn spawn(&self, path: &str, args: &str, _cwd: &str, _elevated: bool) -> Result<()> {
            let mut st = self.state.lock();
            st.effects
                .push(Effect::Spawn(path.to_string(), args.to_string()));
            if !st.files.contains(&path.to_lowercase()) && !path.starts_with("steam:") {
                bail!("the system cannot find the file specified");
            }
            Self::materialize(&mut st, &path.to_lowercase(), false);
            Ok(())
        }

        fn launch_packaged(&self, package_full_name: &str) -> Result<()> {
            let mut st = self.state.lock();
            st.effects
                .push(Effect::LaunchPackaged(package_full_name.to_string()));
            if st.fail_packaged_launch {
                bail!("no app entries found for the package");
            }
            Ok(())
        }

        fn launch_shell_aumid(&self, aumid: &str, _args: &str, _elevated: bool) -> Result<()> {
            let mut st = self.state.lock();
            st.effects.push(Effect::LaunchAumid(aumid.to_string()));
            if st.fail_aumid_launch {
                bail!("shell launch failed");
            }
            Self::materialize(&mut st, aumid, true);
            Ok(())
        }

        fn file_exists(&self, path: &str) -> bool {
            self.state.lock().files.contains(&path.to_lowercase())
        }

        fn installed_apps(&self) -> Vec<InstalledApp> {
            self.state.lock().installed.clone()
        }
    }
}
