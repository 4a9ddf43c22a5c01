use parking_lot::Mutex;
use tracing::{error, trace};

use crate::desktop::Desktop;
use crate::model::{file_name, parent_dir, Application};

const STEAM_PROTOCOL_PREFIX: &str = "steam:";
const EDGE_FILENAME: &str = "msedge.exe";
const EDGE_PROXY_FILENAME: &str = "msedge_proxy.exe";
const CHROME_FILENAME: &str = "chrome.exe";
const CHROME_PROXY_FILENAME: &str = "chrome_proxy.exe";
const PWA_ARGS_PREFIX: &str = "--profile-directory=Default --app-id=";

/// Append-only accumulator of `(failing identifier, message)` pairs gathered
/// while launching. Shared across phases of one reconciliation.
#[derive(Default)]
pub struct ErrorAccumulator {
    entries: Mutex<Vec<(String, String)>>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, identifier: impl Into<String>, message: impl Into<String>) {
        self.entries.lock().push((identifier.into(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }
}

/// Launch an application, trying each strategy in order and stopping at the
/// first success. Every failed attempt is appended to `errors`; returns
/// whether some strategy succeeded.
pub fn launch(desktop: &dyn Desktop, app: &Application, errors: &ErrorAccumulator) -> bool {
    let mut launched = false;

    // Packaged app addressed through its shell apps-folder identity.
    if !app.package_full_name.is_empty() && !app.app_user_model_id.is_empty() {
        trace!("launching {} as {}", app.name, app.app_user_model_id);
        match desktop.launch_shell_aumid(&app.app_user_model_id, &app.command_line_args, app.is_elevated)
        {
            Ok(()) => launched = true,
            Err(err) => errors.push(file_name(&app.path), err.to_string()),
        }
    }

    // Protocol identities are handed to the shell as-is.
    if !launched
        && !app.app_user_model_id.is_empty()
        && app.app_user_model_id.starts_with(STEAM_PROTOCOL_PREFIX)
    {
        trace!("launching {} as {}", app.name, app.app_user_model_id);
        match desktop.spawn(
            &app.app_user_model_id,
            &app.command_line_args,
            "",
            app.is_elevated,
        ) {
            Ok(()) => launched = true,
            Err(err) => errors.push(file_name(&app.path), err.to_string()),
        }
    }

    // Plain packaged launch only works without arguments or elevation.
    if !launched
        && !app.package_full_name.is_empty()
        && app.command_line_args.is_empty()
        && !app.is_elevated
    {
        trace!("launching packaged app {}", app.name);
        match desktop.launch_packaged(&app.package_full_name) {
            Ok(()) => launched = true,
            Err(err) => errors.push(app.package_full_name.clone(), err.to_string()),
        }
    }

    let mut final_path = app.path.clone();
    let mut final_args = app.command_line_args.clone();

    if !launched && !app.pwa_app_id.is_empty() {
        // Newer PWA installs carry their own apps-folder identity.
        if app.numeric_version() >= 1 && !app.app_user_model_id.is_empty() {
            match desktop.launch_shell_aumid(
                &app.app_user_model_id,
                &app.command_line_args,
                app.is_elevated,
            ) {
                Ok(()) => launched = true,
                Err(err) => errors.push(app.app_user_model_id.clone(), err.to_string()),
            }
        }

        // Older installs go through the browser's proxy binary.
        if !launched {
            let host = file_name(&app.path);
            let proxy = match host {
                EDGE_FILENAME => Some(EDGE_PROXY_FILENAME),
                CHROME_FILENAME => Some(CHROME_PROXY_FILENAME),
                _ => None,
            };
            if let Some(proxy) = proxy {
                let dir = parent_dir(&app.path);
                final_path = if dir.is_empty() {
                    proxy.to_string()
                } else {
                    format!("{dir}\\{proxy}")
                };
                final_args = format!(
                    "{PWA_ARGS_PREFIX}{} {}",
                    app.pwa_app_id, app.command_line_args
                );
            }
        }
    }

    // Last resort: run the executable directly.
    if !launched {
        trace!("launching {} at {}", app.name, final_path);
        if !desktop.file_exists(&final_path) {
            error!("file not found at {final_path}");
            errors.push(file_name(&final_path), "File not found");
            return false;
        }

        match desktop.spawn(
            &final_path,
            final_args.trim_end(),
            parent_dir(&final_path),
            app.is_elevated,
        ) {
            Ok(()) => launched = true,
            Err(err) => errors.push(file_name(&final_path), err.to_string()),
        }
    }

    trace!(
        "{} {} at {final_path}",
        app.name,
        if launched { "launched" } else { "not launched" },
    );
    launched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::fake::{Effect, FakeDesktop};
    use crate::model::Rect;

    fn plain_app(path: &str) -> Application {
        Application {
            name: "App".into(),
            path: path.into(),
            position: Rect::new(0, 0, 800, 600),
            ..Default::default()
        }
    }

    #[test]
    fn packaged_app_goes_through_apps_folder() {
        let desktop = FakeDesktop::new();
        let errors = ErrorAccumulator::new();
        let app = Application {
            name: "Terminal".into(),
            package_full_name: "Microsoft.WindowsTerminal_8wekyb3d8bbwe".into(),
            app_user_model_id: "Microsoft.WindowsTerminal".into(),
            ..Default::default()
        };

        assert!(launch(&desktop, &app, &errors));
        assert_eq!(
            desktop.effects(),
            vec![Effect::LaunchAumid("Microsoft.WindowsTerminal".into())]
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn packaged_direct_after_aumid_failure() {
        let desktop = FakeDesktop::new();
        desktop.fail_aumid_launches();
        let errors = ErrorAccumulator::new();
        let app = Application {
            name: "Terminal".into(),
            package_full_name: "Microsoft.WindowsTerminal_8wekyb3d8bbwe".into(),
            app_user_model_id: "Microsoft.WindowsTerminal".into(),
            ..Default::default()
        };

        assert!(launch(&desktop, &app, &errors));
        assert_eq!(
            desktop.effects(),
            vec![
                Effect::LaunchAumid("Microsoft.WindowsTerminal".into()),
                Effect::LaunchPackaged("Microsoft.WindowsTerminal_8wekyb3d8bbwe".into()),
            ]
        );
        assert_eq!(errors.snapshot().len(), 1);
    }

    #[test]
    fn steam_protocol_is_spawned_as_uri() {
        let desktop = FakeDesktop::new();
        let errors = ErrorAccumulator::new();
        let app = Application {
            name: "Game".into(),
            app_user_model_id: "steam://rungameid/440".into(),
            ..Default::default()
        };

        assert!(launch(&desktop, &app, &errors));
        assert_eq!(
            desktop.effects(),
            vec![Effect::Spawn("steam://rungameid/440".into(), String::new())]
        );
    }

    #[test]
    fn modern_pwa_uses_aumid() {
        let desktop = FakeDesktop::new();
        let errors = ErrorAccumulator::new();
        let app = Application {
            name: "My PWA".into(),
            path: "C:\\Program Files\\Edge\\msedge.exe".into(),
            pwa_app_id: "abcdef".into(),
            version: "2".into(),
            app_user_model_id: "MSEdge._crx_abcdef".into(),
            ..Default::default()
        };

        assert!(launch(&desktop, &app, &errors));
        assert_eq!(
            desktop.effects(),
            vec![Effect::LaunchAumid("MSEdge._crx_abcdef".into())]
        );
    }

    #[test]
    fn legacy_pwa_rewrites_to_proxy() {
        let desktop = FakeDesktop::new();
        desktop.register_file("c:\\program files\\edge\\msedge_proxy.exe");
        let errors = ErrorAccumulator::new();
        let app = Application {
            name: "My PWA".into(),
            path: "C:\\Program Files\\Edge\\msedge.exe".into(),
            pwa_app_id: "abcdef".into(),
            command_line_args: "--extra".into(),
            ..Default::default()
        };

        assert!(launch(&desktop, &app, &errors));
        assert_eq!(
            desktop.effects(),
            vec![Effect::Spawn(
                "C:\\Program Files\\Edge\\msedge_proxy.exe".into(),
                "--profile-directory=Default --app-id=abcdef --extra".into(),
            )]
        );
    }

    #[test]
    fn missing_executable_records_filename() {
        let desktop = FakeDesktop::new();
        let errors = ErrorAccumulator::new();

        assert!(!launch(&desktop, &plain_app("C:\\gone\\missing.exe"), &errors));
        assert_eq!(
            errors.snapshot(),
            vec![("missing.exe".to_string(), "File not found".to_string())]
        );
        assert!(desktop.effects().is_empty());
    }

    #[test]
    fn plain_executable_spawns_from_its_directory() {
        let desktop = FakeDesktop::new();
        desktop.register_executable(
            "C:\\Windows\\notepad.exe",
            "",
            Rect::new(0, 0, 800, 600),
        );
        let errors = ErrorAccumulator::new();

        assert!(launch(&desktop, &plain_app("C:\\Windows\\notepad.exe"), &errors));
        assert_eq!(
            desktop.effects(),
            vec![Effect::Spawn("C:\\Windows\\notepad.exe".into(), String::new())]
        );
        assert!(errors.is_empty());
    }
}
