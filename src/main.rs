use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    init_tracing()?;
    info!("starting respace service v{}", env!("CARGO_PKG_VERSION"));
    run()
}

#[cfg(windows)]
fn run() -> Result<()> {
    use std::sync::Arc;

    use respace::service::WorkspacesService;
    use respace::store::Store;
    use respace::win32::Win32Desktop;

    let desktop = Arc::new(Win32Desktop::new());
    let store = Store::new(Store::default_dir());
    info!("workspace store at {}", store.primary_path().display());

    let mut service = WorkspacesService::new(desktop, store);
    service.start()?;

    loop {
        std::thread::park();
    }
}

#[cfg(not(windows))]
fn run() -> Result<()> {
    anyhow::bail!("the respace service drives the Windows desktop and only runs on Windows")
}

fn init_tracing() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
    Ok(())
}
