//! Habit Timer - a durable habit-streak timer
//!
//! This is the main entry point for the habit-timer service.

use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};

use habit_timer::{
    api::create_router,
    config::Config,
    engine::{flush_at_exit, TimerEngine},
    services::{Clock, JsonFileStore, LifecycleSignal, PersistentStore, SystemClock},
    state::AppState,
    tasks::{wake_up_recovery_task, EngineLoop},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("habit_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting habit-timer v{}", env!("CARGO_PKG_VERSION"));
    let store_path = config.store_path();
    info!(
        "Configuration: host={}, port={}, store={}, policy={:?}",
        config.host,
        config.port,
        store_path.display(),
        config.cycle_policy()
    );

    let store: Arc<dyn PersistentStore> = Arc::new(JsonFileStore::open(&store_path));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lifecycle = LifecycleSignal::new();

    // Load (and reconcile) whatever was running before this process started
    let engine = TimerEngine::load(Arc::clone(&store), Arc::clone(&clock), config.engine_settings());
    let (handle, engine_task) = EngineLoop::spawn(engine, &lifecycle, config.loop_settings());

    // Detect host suspend/resume and reconcile on wake
    let wake_task = tokio::spawn(wake_up_recovery_task(
        Arc::clone(&clock),
        lifecycle.clone(),
        config.wake_poll(),
    ));

    let state = Arc::new(AppState::new(
        handle.clone(),
        config.port,
        config.host.clone(),
    ));
    let app = create_router(state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start, /stop                      - Run or stop the timer");
    info!("  POST /restart/request|confirm|cancel    - Restart dialog");
    info!("  PUT  /restart/reason                    - Restart reason input");
    info!("  POST /close/request|confirm|cancel      - Close dialog");
    info!("  PUT  /label                             - Activity label input");
    info!("  POST /lifecycle/foreground|background   - Host lifecycle events");
    info!("  GET  /status, /health");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    wake_task.abort();
    match tokio::time::timeout(Duration::from_secs(2), handle.shutdown()).await {
        Ok(Ok(_)) => {
            if let Err(e) = engine_task.await {
                warn!("Engine loop ended abnormally: {}", e);
            }
        }
        Ok(Err(e)) => warn!("Engine loop already gone: {}", e),
        Err(_) => warn!("Engine loop did not stop in time"),
    }

    // Best-effort synchronous flush straight from the store
    flush_at_exit(store.as_ref(), clock.now());

    info!("Server shutdown complete");
    Ok(())
}
