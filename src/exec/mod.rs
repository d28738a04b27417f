// src/exec/mod.rs

//! Container process lifecycle.
//!
//! - [`supervisor`] owns the single container handle: spawn, respawn,
//!   shutdown.
//! - [`launcher`] provides the `ProcessLauncher` trait and the production
//!   `TokioLauncher`, which tests replace with a fake.
//! - [`handle`] is the supervisor-side view of one running process.
//! - [`output`] forwards stdout/stderr lines into a `LineSink`.

pub mod handle;
pub mod launcher;
pub mod output;
pub mod supervisor;

pub use handle::{ExitReport, ProcessControl, ProcessHandle};
pub use launcher::{ProcessLauncher, TokioLauncher};
pub use output::{forward_lines, LineSink, OutputStream, TracingSink, CONTAINER_TARGET};
pub use supervisor::{ProcessSupervisor, RespawnOutcome};
