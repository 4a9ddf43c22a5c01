use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use tracing::info;

use crate::desktop::{Desktop, InstalledApp};

lazy_static! {
    static ref INSTALLED: RwLock<Option<Arc<Vec<InstalledApp>>>> = RwLock::new(None);
}

/// Populate the process-wide installed-apps snapshot. Called once at service
/// start; the snapshot is read-only afterwards.
pub fn warm(desktop: &dyn Desktop) -> usize {
    let apps = Arc::new(desktop.installed_apps());
    let count = apps.len();
    *INSTALLED.write() = Some(apps);
    info!("apps cache populated with {count} entries");
    count
}

/// Current snapshot; empty until [`warm`] has run.
pub fn snapshot() -> Arc<Vec<InstalledApp>> {
    INSTALLED
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(Vec::new()))
}

/// Display name of an installed application, looked up by its
/// application-user-model id.
pub fn display_name(aumid: &str) -> Option<String> {
    lookup(&snapshot(), aumid)
}

fn lookup(apps: &[InstalledApp], aumid: &str) -> Option<String> {
    if aumid.is_empty() {
        return None;
    }
    apps.iter()
        .find(|app| app.aumid == aumid)
        .map(|app| app.display_name.clone())
}
