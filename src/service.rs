use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::apps_cache;
use crate::desktop::Desktop;
use crate::error::{RestoreError, Result};
use crate::reconciler::Reconciler;
use crate::store::Store;

/// Name of the service's receive pipe.
pub const SERVICE_PIPE_NAME: &str = "respace-service";

/// Releases the in-flight flag when the request is done, whatever the exit
/// path.
struct GatePass {
    busy: Arc<AtomicBool>,
}

impl Drop for GatePass {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// The long-lived workspace service: accepts workspace ids from the IPC
/// boundary, enforces at-most-one reconciliation in flight, and runs each
/// accepted request on a dedicated worker thread.
pub struct WorkspacesService {
    desktop: Arc<dyn Desktop>,
    store: Store,
    busy: Arc<AtomicBool>,
    tx: flume::Sender<(String, GatePass)>,
    rx: Option<flume::Receiver<(String, GatePass)>>,
    worker: Option<JoinHandle<()>>,
    #[cfg(windows)]
    pipe: Option<crate::ipc::PipeServer>,
    started: bool,
}

impl WorkspacesService {
    pub fn new(desktop: Arc<dyn Desktop>, store: Store) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            desktop,
            store,
            busy: Arc::new(AtomicBool::new(false)),
            tx,
            rx: Some(rx),
            worker: None,
            #[cfg(windows)]
            pipe: None,
            started: false,
        }
    }

    /// Warm the apps cache, start the request worker, and install the IPC
    /// receive pipe.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.started {
            warn!("workspace service already started");
            return Ok(());
        }
        info!("starting workspace service");

        let cache_started = Instant::now();
        let entries = apps_cache::warm(self.desktop.as_ref());
        info!(
            "apps cache pre-loaded in {} ms with {entries} entries",
            cache_started.elapsed().as_millis()
        );

        let rx = self.rx.take().expect("request receiver consumed");
        let desktop = self.desktop.clone();
        let store = self.store.clone();
        let worker = std::thread::spawn(move || {
            while let Ok((workspace_id, pass)) = rx.recv() {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    Self::process(desktop.as_ref(), &store, &workspace_id);
                }));
                if result.is_err() {
                    error!("panic while processing workspace {workspace_id}");
                }
                drop(pass);
            }
        });
        self.worker = Some(worker);

        #[cfg(windows)]
        {
            let gate_busy = self.busy.clone();
            let gate_tx = self.tx.clone();
            self.pipe = Some(crate::ipc::PipeServer::spawn(
                SERVICE_PIPE_NAME,
                move |message| {
                    if let Err(err) = Self::accept(&gate_busy, &gate_tx, message.trim()) {
                        warn!("request rejected: {err}");
                    }
                },
            )?);
        }

        self.started = true;
        info!("workspace service started");
        Ok(())
    }

    /// Accept or reject a workspace request. Rejection leaves no trace; there
    /// is no queueing and no retry.
    pub fn on_request(&self, workspace_id: &str) -> Result<()> {
        Self::accept(&self.busy, &self.tx, workspace_id)
    }

    fn accept(
        busy: &Arc<AtomicBool>,
        tx: &flume::Sender<(String, GatePass)>,
        workspace_id: &str,
    ) -> Result<()> {
        info!("received workspace request: {workspace_id}");
        if busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("already processing a workspace request, ignoring: {workspace_id}");
            return Err(RestoreError::Busy);
        }

        let pass = GatePass { busy: busy.clone() };
        // A dead worker means shutdown; the pass unlocks the gate on drop.
        let _ = tx.send((workspace_id.to_string(), pass));
        Ok(())
    }

    fn process(desktop: &dyn Desktop, store: &Store, workspace_id: &str) {
        let started = Instant::now();
        info!("processing workspace: {workspace_id}");

        let workspace = match store.find(workspace_id) {
            Ok(workspace) => workspace,
            Err(err) => {
                error!("failed to load workspace {workspace_id}: {err}");
                return;
            }
        };
        info!(
            "loaded workspace {} with {} apps",
            workspace.name,
            workspace.apps.len()
        );

        Reconciler::new(desktop).run(&workspace);
        info!(
            "workspace processing completed in {} ms",
            started.elapsed().as_millis()
        );
    }

    /// Tear down IPC and drain the in-flight request.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        info!("stopping workspace service");

        #[cfg(windows)]
        {
            self.pipe = None;
        }

        // Closing the channel ends the worker after the request in flight.
        let (tx, _rx) = flume::unbounded();
        drop(std::mem::replace(&mut self.tx, tx));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.started = false;
        info!("workspace service stopped");
    }
}

impl Drop for WorkspacesService {
    fn drop(&mut self) {
        self.stop();
    }
}
