//! Controller connection orchestration.
//!
//! Every switch connects to each of its agent's controllers over its own
//! TCP connection. Connections are established and held by tasks on a
//! shared I/O substrate ([`IoWorker`]); callers only ever issue
//! non-blocking connect and disconnect requests.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ofagent_types::OfController;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{SwitchMgrError, SwitchMgrResult};
use crate::switch::OfSwitch;

/// Connects switches to, and disconnects them from, external controllers.
///
/// Both operations return immediately. Outcomes are reported through the
/// switch's channel set and log records only.
#[async_trait]
pub trait ControllerConnector: Send + Sync {
    /// Starts one independent connection attempt per controller.
    fn connect(&self, switch: &Arc<OfSwitch>, controllers: &BTreeSet<OfController>);

    /// Closes the switch's channels to the given controllers.
    fn disconnect(&self, switch: &Arc<OfSwitch>, controllers: &BTreeSet<OfController>);

    /// Closes every connection and waits for the I/O tasks to finish.
    async fn shutdown(&self) {}
}

/// Shared pool that runs every controller connection task.
#[derive(Debug, Clone)]
pub struct IoWorker {
    handle: Handle,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl IoWorker {
    /// Creates a worker on the current tokio runtime.
    pub fn new() -> SwitchMgrResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| SwitchMgrError::internal(format!("no tokio runtime: {}", e)))?;
        Ok(Self::with_handle(handle))
    }

    /// Creates a worker spawning onto `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn_on(task, &self.handle);
    }

    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Returns true once shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Returns the number of connection tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels every connection task and waits for all of them to exit.
    pub async fn shutdown_gracefully(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("I/O worker stopped");
    }
}

/// Production [`ControllerConnector`] using plain TCP connections.
#[derive(Debug, Clone)]
pub struct ConnectionOrchestrator {
    config: ConnectionConfig,
    io: IoWorker,
}

impl ConnectionOrchestrator {
    pub fn new(config: ConnectionConfig, io: IoWorker) -> Self {
        Self { config, io }
    }

    pub fn io(&self) -> &IoWorker {
        &self.io
    }
}

#[async_trait]
impl ControllerConnector for ConnectionOrchestrator {
    fn connect(&self, switch: &Arc<OfSwitch>, controllers: &BTreeSet<OfController>) {
        if self.io.is_shutdown() {
            debug!(dpid = %switch.dpid(), "I/O worker stopped, ignoring connection request");
            return;
        }

        for controller in controllers {
            let close = self.io.shutdown_token();
            let attempt = switch.begin_attempt(controller.socket_addr(), close.clone());
            let handler = OfConnectionHandler {
                switch: Arc::clone(switch),
                controller: *controller,
                config: self.config.clone(),
                attempt,
                close,
            };
            self.io.spawn(handler.run());
        }
        debug!(dpid = %switch.dpid(), controllers = ?controllers, "Connection requested");
    }

    fn disconnect(&self, switch: &Arc<OfSwitch>, controllers: &BTreeSet<OfController>) {
        let addrs: HashSet<SocketAddr> = controllers.iter().map(OfController::socket_addr).collect();

        let pending = switch.cancel_attempts(&addrs);
        switch
            .controller_channels()
            .iter()
            .filter(|channel| addrs.contains(&channel.remote_addr()))
            .for_each(|channel| channel.disconnect());
        debug!(
            dpid = %switch.dpid(),
            controllers = ?controllers,
            pending,
            "Disconnection requested"
        );
    }

    async fn shutdown(&self) {
        self.io.shutdown_gracefully().await;
    }
}

/// Owns one switch-to-controller connection for its whole life.
struct OfConnectionHandler {
    switch: Arc<OfSwitch>,
    controller: OfController,
    config: ConnectionConfig,
    attempt: u64,
    /// Cancelled by a disconnect request or by I/O worker shutdown.
    close: CancellationToken,
}

impl OfConnectionHandler {
    #[instrument(skip(self), fields(dpid = %self.switch.dpid(), controller = %self.controller))]
    async fn run(self) {
        let Some(stream) = self.establish().await else {
            self.switch.end_attempt(self.attempt);
            return;
        };

        let remote = stream.peer_addr().unwrap_or_else(|_| self.controller.socket_addr());
        let channel = self.switch.add_controller_channel(remote, self.close.clone());
        self.switch.end_attempt(self.attempt);
        info!("Connected to controller");

        self.hold(stream, &self.close).await;

        self.switch.delete_controller_channel(channel.id());
        info!("Disconnected from controller");
    }

    async fn establish(&self) -> Option<TcpStream> {
        let addr = self.controller.socket_addr();
        let connect = tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(addr));

        let stream = tokio::select! {
            biased;
            _ = self.close.cancelled() => {
                debug!("Connection attempt cancelled");
                return None;
            }
            result = connect => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to connect to controller");
                    return None;
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.connect_timeout_ms,
                        "Timed out connecting to controller"
                    );
                    return None;
                }
            },
        };

        if self.config.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }
        Some(stream)
    }

    /// Keeps the connection open until it is closed from either side.
    async fn hold(&self, mut stream: TcpStream, close: &CancellationToken) {
        let mut buf = vec![0u8; self.config.read_buffer_size];
        loop {
            tokio::select! {
                _ = close.cancelled() => break,
                read = stream.read(&mut buf) => match read {
                    Ok(0) => {
                        debug!("Connection closed by controller");
                        break;
                    }
                    Ok(n) => trace!(bytes = n, "Discarding controller message"),
                    Err(e) => {
                        warn!(error = %e, "Controller connection failed");
                        break;
                    }
                },
            }
        }
        if let Err(e) = stream.shutdown().await {
            trace!(error = %e, "Socket shutdown failed");
        }
    }
}
