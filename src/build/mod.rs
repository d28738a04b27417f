// src/build/mod.rs

//! Container build step.
//!
//! [`builder`] gates compilation on the rebuild flag and the target platform;
//! [`compiler`] holds the `Compiler` trait and the command-line backend.

use std::path::PathBuf;

use crate::types::Platform;

pub mod builder;
pub mod compiler;

pub use builder::{artifact_digest, BuildArtifact, BuildOutcome, Builder};
pub use compiler::{CommandCompiler, Compiler};

/// What to build and for which platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub entry_point: PathBuf,
    pub output: PathBuf,
    pub target_platform: Platform,
}
