// src/server/mod.rs

//! Service runtime: the on-demand background service
//!
//! The service owns the metadata store and the RPC listener, hosts the
//! auto-update scheduler, and optionally shuts itself down after a period
//! of inactivity. Clients auto-start it, so shutdown is cheap: the next
//! invocation respawns it.

pub mod handlers;
pub mod middleware;

use crate::autoupdate::Scheduler;
use crate::config::{AppDirs, ServerConfig};
use crate::error::Result;
use crate::store::Storage;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Idle-monitor granularity; real idle shutdown happens within
/// `idle_timeout` plus one tick.
const IDLE_TICK: Duration = Duration::from_secs(30);

/// State shared between the runtime and the RPC handlers
pub struct ServiceState {
    pub config: ServerConfig,
    pub address: String,
    pub store: Arc<Storage>,
    started_at: Instant,
    last_activity: RwLock<Instant>,
    running: AtomicBool,
}

impl ServiceState {
    /// Stamp the activity clock (called by the activity interceptor)
    pub fn touch_activity(&self) {
        if let Ok(mut last) = self.last_activity.write() {
            *last = Instant::now();
        }
    }

    /// Time since the last RPC activity
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .read()
            .map(|last| last.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn uptime_seconds(&self) -> i64 {
        self.started_at.elapsed().as_secs() as i64
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A bound, not-yet-serving service instance
pub struct Server {
    state: Arc<ServiceState>,
    listener: TcpListener,
    cancel: CancellationToken,
    scheduler: Arc<Scheduler>,
}

impl Server {
    /// Open the store and bind the listener.
    ///
    /// Port 0 binds an ephemeral port; `local_addr` reports the real one.
    pub async fn bind(config: ServerConfig, dirs: &AppDirs) -> Result<Self> {
        dirs.ensure()?;
        let store = Arc::new(Storage::new(&config.database_path)?);

        let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;
        let port = listener.local_addr()?.port();
        let address = format!("{}:{}", config.bind_address, port);

        let now = Instant::now();
        let state = Arc::new(ServiceState {
            address: address.clone(),
            store,
            started_at: now,
            last_activity: RwLock::new(now),
            running: AtomicBool::new(false),
            config,
        });

        let scheduler = Arc::new(Scheduler::new(dirs.clone(), format!("http://{}", address)));

        Ok(Self {
            state,
            listener,
            cancel: CancellationToken::new(),
            scheduler,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the service when cancelled; cancelling twice is a
    /// no-op, so `Stop` is idempotent.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve until stopped, then drain in-flight calls, stop the scheduler,
    /// and close the store.
    pub async fn serve(self) -> Result<()> {
        let state = self.state;
        state.running.store(true, Ordering::SeqCst);

        tracing::info!(
            address = %state.address,
            namespace = %state.config.namespace,
            database = %state.config.database_path.display(),
            idle_timeout = ?state.config.idle_timeout,
            "service started"
        );

        let router = handlers::router(state.clone());

        if let Some(idle_timeout) = state.config.idle_timeout {
            tokio::spawn(monitor_idle(
                state.clone(),
                self.cancel.clone(),
                idle_timeout,
            ));
        }

        self.scheduler.clone().start(self.cancel.child_token());

        let cancel = self.cancel.clone();
        let shutdown = async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received shutdown signal");
                }
            }
        };

        let result = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        tracing::info!("stopping service");
        self.scheduler.stop().await;
        state.store.close();
        state.running.store(false, Ordering::SeqCst);
        tracing::info!("service stopped");

        result?;
        Ok(())
    }
}

/// Shut the service down once no activity has been seen for `idle_timeout`
async fn monitor_idle(
    state: Arc<ServiceState>,
    cancel: CancellationToken,
    idle_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(IDLE_TICK);
    ticker.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let idle = state.idle_for();
                if idle >= idle_timeout {
                    tracing::info!(
                        idle = ?idle,
                        timeout = ?idle_timeout,
                        "idle timeout reached, shutting down"
                    );
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}
