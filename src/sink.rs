use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::Delivery;

/// Destination for formatter invocations, the equivalent of an interactive terminal
#[cfg_attr(test, mockall::automock)]
pub trait CommandSink {
    /// Make the sink visible to the user before commands are sent
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be shown
    fn show(&mut self) -> Result<()> {
        Ok(())
    }

    /// Send one shell command line to the sink
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is unusable. A command that runs and fails
    /// is reported through [`Delivery::Failed`] instead.
    fn send(&mut self, command: &str) -> Result<Delivery>;
}

/// Creates a fresh sink for every triggered run
#[cfg_attr(test, mockall::automock)]
pub trait SinkFactory {
    /// Open a sink whose commands run relative to `workspace_root`
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be created
    fn open(&self, workspace_root: &Path) -> Result<Box<dyn CommandSink>>;
}

/// Where console sinks write what they show the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Console {
    #[default]
    Stdout,
    /// Used when stdout carries machine-readable output.
    Stderr,
}

impl Console {
    fn writer(self) -> Box<dyn Write + Send> {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
        }
    }

    fn stdio(self) -> Stdio {
        match self {
            Self::Stdout => Stdio::inherit(),
            Self::Stderr => Stdio::from(io::stderr()),
        }
    }
}

/// Runs each command through `sh -c` in the workspace and waits for it to exit
pub struct ShellSink {
    name: String,
    workspace_root: PathBuf,
    console: Console,
}

impl ShellSink {
    #[must_use]
    pub fn new(name: &str, workspace_root: PathBuf, console: Console) -> Self {
        Self {
            name: name.to_string(),
            workspace_root,
            console,
        }
    }
}

impl CommandSink for ShellSink {
    fn show(&mut self) -> Result<()> {
        writeln!(self.console.writer(), "▶ {}", self.name)?;
        Ok(())
    }

    #[instrument(skip(self), fields(workspace_root = %self.workspace_root.display()))]
    fn send(&mut self, command: &str) -> Result<Delivery> {
        let status = Command::new("sh")
            .args(["-c", command])
            .current_dir(&self.workspace_root)
            .stdin(Stdio::null())
            .stdout(self.console.stdio())
            .status()
            .map_err(|e| Error::Sink(e.to_string()))?;

        debug!(status = %status, "Command finished");
        if status.success() {
            Ok(Delivery::Completed)
        } else {
            Ok(Delivery::Failed {
                code: status.code(),
            })
        }
    }
}

/// Prints each command instead of running it
pub struct DryRunSink<W: Write> {
    out: W,
}

impl<W: Write> DryRunSink<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CommandSink for DryRunSink<W> {
    fn send(&mut self, command: &str) -> Result<Delivery> {
        writeln!(self.out, "$ {command}").map_err(|e| Error::Sink(e.to_string()))?;
        Ok(Delivery::Sent)
    }
}

/// Opens [`ShellSink`]s, or [`DryRunSink`]s when `dry_run` is set
#[derive(Debug, Clone)]
pub struct ConsoleSinks {
    pub name: String,
    pub dry_run: bool,
    pub console: Console,
}

impl Default for ConsoleSinks {
    fn default() -> Self {
        Self {
            name: "arc-format".to_string(),
            dry_run: false,
            console: Console::Stdout,
        }
    }
}

impl SinkFactory for ConsoleSinks {
    #[instrument(
        skip(self),
        fields(workspace_root = %workspace_root.display(), dry_run = self.dry_run)
    )]
    fn open(&self, workspace_root: &Path) -> Result<Box<dyn CommandSink>> {
        if self.dry_run {
            return Ok(Box::new(DryRunSink::new(self.console.writer())));
        }

        if !workspace_root.is_dir() {
            return Err(Error::Sink(format!(
                "workspace root {} is not a directory",
                workspace_root.display()
            )));
        }

        Ok(Box::new(ShellSink::new(
            &self.name,
            workspace_root.to_path_buf(),
            self.console,
        )))
    }
}
