//! Core functionality for vcxwatch
//!
//! This crate keeps a generated Visual C++ project descriptor and the source
//! tree it lists in agreement: it watches the tree, coalesces relevant
//! changes, and reconciles the referenced-file set against what is on disk.

pub mod config;
pub mod monitor;
pub mod reconcile;

pub use config::{Config, ConfigError, GeneratorConfig};
pub use monitor::{EventFilter, EventPipeline, FileWatcher, MonitorConfig, WatchedEvent};
pub use reconcile::{Orchestrator, OrchestratorConfig, Phase, ReconcileError, RunOutcome};
