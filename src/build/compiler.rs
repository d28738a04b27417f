// src/build/compiler.rs

//! Pluggable compiler backend.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::types::BoxFuture;

/// Turns repository source into a standalone executable.
pub trait Compiler: Send {
    fn compile<'a>(&'a mut self, entry: &'a Path, output: &'a Path) -> BoxFuture<'a, Result<()>>;
}

/// Runs an external compiler/bundler.
///
/// `args` is a template; `{entry}` and `{output}` inside any argument are
/// replaced with the entry point and output path.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expand the argument template for one invocation.
    pub fn render_args(&self, entry: &Path, output: &Path) -> Vec<String> {
        let entry = entry.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{entry}", &entry).replace("{output}", &output))
            .collect()
    }
}

impl Compiler for CommandCompiler {
    fn compile<'a>(&'a mut self, entry: &'a Path, output: &'a Path) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let args = self.render_args(entry, output);
            info!(program = %self.program, ?args, "invoking compiler");

            let out = Command::new(&self.program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .with_context(|| format!("spawning compiler '{}'", self.program))?;

            let stdout = String::from_utf8_lossy(&out.stdout);
            for line in stdout.lines() {
                debug!("compiler stdout: {}", line);
            }

            if !out.status.success() {
                let stderr = String::from_utf8_lossy(&out.stderr);
                bail!(
                    "compiler '{}' exited with {}: {}",
                    self.program,
                    out.status,
                    stderr.trim()
                );
            }

            Ok(())
        })
    }
}
