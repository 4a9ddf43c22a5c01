use serde::{Deserialize, Serialize};

/// Screen-coordinate rectangle in device pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    #[serde(alias = "w")]
    pub width: i32,
    #[serde(alias = "h")]
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }
    pub fn top(&self) -> i32 {
        self.y
    }
    pub fn right(&self) -> i32 {
        self.x + self.width
    }
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left() && x < self.right() && y >= self.top() && y < self.bottom()
    }
}

/// Placement state of a top-level window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// One monitor of a workspace: the full device rectangle and the work area
/// (device minus taskbars and docked chrome).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSpec {
    pub id: String,
    pub device: Rect,
    pub work: Rect,
}

impl MonitorSpec {
    /// Offset between work-area and device origins. Subtracting it from a
    /// device-coordinate rectangle yields the work-area position.
    pub fn work_offset(&self) -> (i32, i32) {
        (
            self.work.left() - self.device.left(),
            self.work.top() - self.device.top(),
        )
    }
}

/// One application entry of a workspace. A workspace may hold several entries
/// for the same program; each entry is its own placement target.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub path: String,
    pub command_line_args: String,
    pub package_full_name: String,
    pub app_user_model_id: String,
    pub pwa_app_id: String,
    pub version: String,
    pub is_elevated: bool,
    pub position: Rect,
    pub is_minimized: bool,
    pub is_maximized: bool,
}

impl Application {
    pub fn target_state(&self) -> WindowState {
        if self.is_minimized {
            WindowState::Minimized
        } else if self.is_maximized {
            WindowState::Maximized
        } else {
            WindowState::Normal
        }
    }

    /// Whether two entries refer to the same program. Used to serialize
    /// launches of duplicate entries; intentionally ignores placement fields.
    pub fn same_program(&self, other: &Application) -> bool {
        self.path == other.path
            && self.app_user_model_id == other.app_user_model_id
            && self.package_full_name == other.package_full_name
            && self.pwa_app_id == other.pwa_app_id
    }

    /// `version` parsed as an integer, 0 when absent or malformed.
    pub fn numeric_version(&self) -> i32 {
        self.version.trim().parse().unwrap_or(0)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub monitors: Vec<MonitorSpec>,
    pub apps: Vec<Application>,
    pub move_existing_windows: bool,
}

/// Last path component of a Windows-style path.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Last path component without its extension.
pub(crate) fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Everything before the last path component, without the trailing separator.
pub(crate) fn parent_dir(path: &str) -> &str {
    let name = file_name(path);
    if name.len() == path.len() {
        return "";
    }
    let end = path.len() - name.len();
    path[..end].trim_end_matches(['\\', '/'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_workspace_document() {
        let json = r#"{
            "id": "ws-1",
            "name": "Dev",
            "moveExistingWindows": true,
            "monitors": [
                {"id": "m0", "device": {"x": 0, "y": 0, "w": 1920, "h": 1080},
                 "work": {"x": 0, "y": 40, "w": 1920, "h": 1040}}
            ],
            "apps": [
                {"name": "Notepad", "path": "C:\\Windows\\notepad.exe",
                 "commandLineArgs": "", "appUserModelId": "",
                 "position": {"x": 100, "y": 100, "width": 800, "height": 600},
                 "isMinimized": false, "isMaximized": false,
                 "someFutureField": 42}
            ]
        }"#;

        let ws: Workspace = serde_json::from_str(json).unwrap();
        assert_eq!(ws.id, "ws-1");
        assert!(ws.move_existing_windows);
        assert_eq!(ws.monitors[0].work.top(), 40);
        assert_eq!(ws.monitors[0].work_offset(), (0, 40));
        assert_eq!(ws.apps[0].position, Rect::new(100, 100, 800, 600));
        assert_eq!(ws.apps[0].target_state(), WindowState::Normal);
    }

    #[test]
    fn missing_fields_default() {
        let app: Application = serde_json::from_str(r#"{"name": "X"}"#).unwrap();
        assert!(app.path.is_empty());
        assert!(!app.is_elevated);
        assert_eq!(app.numeric_version(), 0);
    }

    #[test]
    fn target_state_prefers_minimized() {
        let mut app = Application::default();
        app.is_minimized = true;
        assert_eq!(app.target_state(), WindowState::Minimized);
        app.is_minimized = false;
        app.is_maximized = true;
        assert_eq!(app.target_state(), WindowState::Maximized);
    }

    #[test]
    fn same_program_ignores_placement() {
        let mut a = Application {
            name: "Notepad".into(),
            path: "C:\\Windows\\notepad.exe".into(),
            position: Rect::new(0, 0, 400, 300),
            ..Default::default()
        };
        let mut b = a.clone();
        b.position = Rect::new(800, 0, 400, 300);
        b.is_maximized = true;
        assert!(a.same_program(&b));

        a.app_user_model_id = "Some.App".into();
        assert!(!a.same_program(&b));
    }

    #[test]
    fn path_helpers() {
        assert_eq!(file_name("C:\\Windows\\notepad.exe"), "notepad.exe");
        assert_eq!(file_stem("C:\\Windows\\notepad.exe"), "notepad");
        assert_eq!(parent_dir("C:\\Windows\\notepad.exe"), "C:\\Windows");
        assert_eq!(file_stem("notepad"), "notepad");
        assert_eq!(parent_dir("notepad.exe"), "");
    }
}
