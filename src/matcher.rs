use crate::desktop::{Desktop, WindowId};
use crate::model::{file_stem, Application, Workspace, WindowState};
use crate::pwa::{is_browser_host, PwaResolver};

/// Placement penalty when exactly one side of a candidate pair is minimized.
const STATE_MISMATCH_PENALTY: i32 = 10_000;

/// Decides whether a window belongs to a workspace application and how far a
/// candidate window sits from an application's target placement.
pub struct Matcher<'a> {
    desktop: &'a dyn Desktop,
    pwa: &'a PwaResolver,
}

impl<'a> Matcher<'a> {
    pub fn new(desktop: &'a dyn Desktop, pwa: &'a PwaResolver) -> Self {
        Self { desktop, pwa }
    }

    /// Ordered predicate cascade; the first hit wins.
    ///
    /// 1. application-user-model id (the only OS-authoritative identity)
    /// 2. owning process path, case-insensitive
    /// 3. process stem against the application name (relocated binaries)
    /// 4. PWA identity resolved from a browser host window's AUMID
    pub fn is_match(&self, window: WindowId, app: &Application) -> bool {
        let Some(process_path) = self.desktop.process_path(window) else {
            return false;
        };
        let window_aumid = self.desktop.window_aumid(window).unwrap_or_default();

        if !window_aumid.is_empty()
            && !app.app_user_model_id.is_empty()
            && window_aumid == app.app_user_model_id
        {
            return true;
        }

        if !app.path.is_empty() && process_path.eq_ignore_ascii_case(&app.path) {
            return true;
        }

        let stem = file_stem(&process_path);
        if stem == app.name {
            return true;
        }

        if !app.pwa_app_id.is_empty() && is_browser_host(&stem.to_lowercase()) {
            if let Some(app_id) = self.pwa.app_id_from_aumid(&window_aumid) {
                if app_id == app.pwa_app_id {
                    return true;
                }
            }
        }

        false
    }

    /// Whether the window belongs to any application of the workspace.
    pub fn matches_workspace(&self, window: WindowId, workspace: &Workspace) -> bool {
        workspace.apps.iter().any(|app| self.is_match(window, app))
    }

    /// Distance between a window and an application's target placement.
    /// 0 is a perfect match (both minimized); otherwise a placement-state
    /// penalty plus the summed edge deltas.
    pub fn distance(&self, window: WindowId, app: &Application) -> i32 {
        let minimized = self.desktop.window_state(window) == WindowState::Minimized;
        if app.is_minimized && minimized {
            return 0;
        }

        let penalty = if app.is_minimized || minimized {
            STATE_MISMATCH_PENALTY
        } else {
            1
        };

        let rect = self.desktop.window_rect(window).unwrap_or_default();
        penalty
            + (app.position.left() - rect.left()).abs()
            + (app.position.top() - rect.top()).abs()
            + (app.position.right() - rect.right()).abs()
            + (app.position.bottom() - rect.bottom()).abs()
    }

    /// Nearest candidate by distance; the first candidate wins ties.
    pub fn nearest(
        &self,
        app: &Application,
        candidates: impl IntoIterator<Item = WindowId>,
    ) -> Option<(WindowId, i32)> {
        let mut best: Option<(WindowId, i32)> = None;
        for window in candidates {
            let d = self.distance(window, app);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((window, d));
            }
        }
        best
    }
}
