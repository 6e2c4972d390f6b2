//! Process lifecycle: configure, run, shut down once.
//!
//! ```text
//! Configuring --build--> Running --signal or root cancel--> ShuttingDown --> Stopped
//!      |                                                                     ^
//!      +------------- configuration or construction failure ----------------+
//! ```
//!
//! The running service is owned exclusively by [`Lifecycle::run`] and is
//! shut down at most once, whichever of the two triggers fires first.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{ConfigResolver, ServerConfig};
use crate::error::{LifecycleError, ServiceError};

/// Observable phase of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Configuring,
    Running,
    ShuttingDown,
    Stopped,
}

/// Operating-system shutdown requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// What ended the running phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Signal(Signal),
    Cancelled,
}

/// A running service that can be stopped.
#[async_trait]
pub trait Service: Send + Sync {
    /// Stop the service. Implementations abandon their graceful wait once
    /// `ctx` is cancelled.
    async fn shutdown(&self, ctx: CancellationToken) -> Result<(), ServiceError>;
}

/// Builds the service from a resolved configuration.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    type Service: Service;

    async fn build(&self, config: ServerConfig) -> Result<Self::Service, ServiceError>;
}

/// Forward SIGINT and SIGTERM (ctrl-c elsewhere) into a channel.
///
/// Must be called from within a tokio runtime.
pub fn os_signals() -> std::io::Result<mpsc::Receiver<Signal>> {
    let (tx, rx) = mpsc::channel(4);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    Some(()) = interrupt.recv() => Signal::Interrupt,
                    Some(()) = terminate.recv() => Signal::Terminate,
                    else => break,
                };
                if tx.send(received).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(Signal::Interrupt).await.is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Drives a service from configuration to shutdown.
pub struct Lifecycle<R, F> {
    resolver: R,
    factory: F,
    state: watch::Sender<LifecycleState>,
}

impl<R, F> Lifecycle<R, F>
where
    R: ConfigResolver,
    F: ServiceFactory,
{
    pub fn new(resolver: R, factory: F) -> Self {
        let (state, _) = watch::channel(LifecycleState::Configuring);
        Self {
            resolver,
            factory,
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        info!(from = ?previous, to = ?next, "Lifecycle state changed");
    }

    /// Run until a signal arrives or `root` is cancelled, then shut down.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Configuration`] when the configuration cannot be
    ///   resolved; the factory is not invoked
    /// - [`LifecycleError::Construction`] when the factory fails
    /// - [`LifecycleError::Shutdown`] when the service fails to stop
    ///
    /// The state is `Stopped` on every return path.
    pub async fn run(
        self,
        root: CancellationToken,
        mut signals: mpsc::Receiver<Signal>,
    ) -> Result<ShutdownTrigger, LifecycleError> {
        let config = match self.resolver.resolve() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "Configuration failed");
                self.transition(LifecycleState::Stopped);
                return Err(e.into());
            }
        };

        let service = match self.factory.build(config).await {
            Ok(service) => service,
            Err(e) => {
                error!(error = %e, "Service construction failed");
                self.transition(LifecycleState::Stopped);
                return Err(LifecycleError::Construction(e));
            }
        };

        self.transition(LifecycleState::Running);

        let trigger = tokio::select! {
            Some(received) = signals.recv() => ShutdownTrigger::Signal(received),
            _ = root.cancelled() => ShutdownTrigger::Cancelled,
        };
        info!(trigger = ?trigger, "Shutdown requested");

        self.transition(LifecycleState::ShuttingDown);

        // A cancelled root must not cut the graceful wait short.
        let ctx = match trigger {
            ShutdownTrigger::Signal(_) => root,
            ShutdownTrigger::Cancelled => CancellationToken::new(),
        };

        let result = service.shutdown(ctx).await;
        self.transition(LifecycleState::Stopped);

        match result {
            Ok(()) => Ok(trigger),
            Err(e) => {
                error!(error = %e, "Shutdown failed");
                Err(LifecycleError::Shutdown(e))
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
