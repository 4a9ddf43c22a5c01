use std::collections::HashMap;

use parking_lot::Mutex;

/// Process stems of the browser binaries that can host progressive web apps.
pub const BROWSER_HOST_STEMS: &[&str] = &["msedge", "chrome"];

pub fn is_browser_host(stem: &str) -> bool {
    BROWSER_HOST_STEMS.contains(&stem)
}

/// Resolves the progressive-web-app identity embedded in a browser host
/// window's application-user-model id.
///
/// Chromium hosts stamp app windows with `<host>[.<profile>]._crx_<app-id>`;
/// the id after the `_crx_` marker is the browser-internal app identity.
/// Lookups are memoized for the lifetime of the resolver (one
/// reconciliation).
#[derive(Default)]
pub struct PwaResolver {
    memo: Mutex<HashMap<String, Option<String>>>,
}

impl PwaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_id_from_aumid(&self, aumid: &str) -> Option<String> {
        if aumid.is_empty() {
            return None;
        }
        let mut memo = self.memo.lock();
        memo.entry(aumid.to_string())
            .or_insert_with(|| parse_crx_id(aumid))
            .clone()
    }
}

fn parse_crx_id(aumid: &str) -> Option<String> {
    let (_, tail) = aumid.split_once("_crx_")?;
    let id: String = tail.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
