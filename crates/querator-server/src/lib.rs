//! # Querator Server
//!
//! Process shell of the Querator queue service: layered configuration,
//! logging, the configure/run/shutdown lifecycle and an HTTP daemon that
//! serves the dispatch route table.
//!
//! Queue semantics are supplied through [`daemon::Backend`]; the shipped
//! binary runs with [`daemon::UnimplementedBackend`].

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod lifecycle;
pub mod logging;

pub use config::{ConfigError, ConfigOverrides, ConfigResolver, LayeredConfig, ServerConfig};
pub use daemon::{Backend, Daemon, DaemonFactory, UnimplementedBackend};
pub use error::{LifecycleError, ServiceError};
pub use lifecycle::{
    os_signals, Lifecycle, LifecycleState, Service, ServiceFactory, ShutdownTrigger, Signal,
};
