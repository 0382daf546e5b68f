//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::WatchError;
use crate::reconcile::DeploymentListener;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::console;

/// Run the range watcher until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    listener: Arc<dyn DeploymentListener>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), WatchError> {
    info!("Initializing range watcher...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, listener, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start range watcher: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    listener: Arc<dyn DeploymentListener>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, WatchError> {
    let app_state = Arc::new(AppState::init(options, listener)?);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.print_toasts {
        init_console_worker(app_state.clone(), shutdown_manager, shutdown_tx.subscribe())?;
    }

    for range_id in &options.ranges {
        app_state.watcher.watch(range_id);
    }
    info!(ranges = options.ranges.len(), "Watching ranges");

    if options.enable_server {
        init_server(options, app_state.clone(), shutdown_manager, shutdown_tx.subscribe()).await?;
    }

    Ok(app_state)
}

fn init_console_worker(
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    info!("Initializing console worker...");

    let signals = app_state.watcher.signals();
    let handle = tokio::spawn(async move {
        console::run(
            signals,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_console_worker_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(app_state.watcher.clone());

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), WatchError>>>,
    console_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            console_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), WatchError> {
        if self.app_state.is_some() {
            return Err(WatchError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_console_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), WatchError> {
        if self.console_worker_handle.is_some() {
            return Err(WatchError::ShutdownError("console_handle already set".to_string()));
        }
        self.console_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), WatchError>>,
    ) -> Result<(), WatchError> {
        if self.server_handle.is_some() {
            return Err(WatchError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), WatchError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WatchError::ShutdownError(format!(
                "shutdown timed out after {:?}",
                self.lifecycle_options.max_shutdown_delay
            ))),
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), WatchError> {
        info!("Shutting down range watcher...");

        // 1. Local server, so no request starts a new session
        if let Some(handle) = self.server_handle.take() {
            handle.await.map_err(|e| WatchError::ShutdownError(e.to_string()))??;
        }

        // 2. Watch sessions
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown();
        }

        // 3. Console worker
        if let Some(handle) = self.console_worker_handle.take() {
            handle.await.map_err(|e| WatchError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
