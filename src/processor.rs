use crate::error::Result;
use crate::formatter::{
    Pacer, SequentialFormatter, ThreadPacer, DEFAULT_DELAY, DEFAULT_FORMATTER_TEMPLATE,
};
use crate::sink::{Console, ConsoleSinks, SinkFactory};
use crate::status::{absolute_root, get_modified_files, StatusCli, StatusQuerier};
use crate::types::{Delivery, FormatReport, ModifiedFileEntry, Notification};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Settings for building a processor with the real command line tools
#[derive(Debug, Clone)]
pub struct Config {
    /// Whitespace separated status command line
    pub status_command: String,
    /// Formatter command with a `{path}` placeholder
    pub formatter_template: String,
    /// Pause after each formatter invocation
    pub delay: Duration,
    /// Print formatter commands instead of running them
    pub dry_run: bool,
    /// Where sinks show their output
    pub console: Console,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status_command: "arc status".to_string(),
            formatter_template: DEFAULT_FORMATTER_TEMPLATE.to_string(),
            delay: DEFAULT_DELAY,
            dry_run: false,
            console: Console::Stdout,
        }
    }
}

type SharedQuerier = Box<dyn StatusQuerier + Send + Sync>;
type SharedSinks = Box<dyn SinkFactory + Send + Sync>;
type SharedPacer = Box<dyn Pacer + Send + Sync>;

/// Finds modified files in a workspace and formats them, one run at a time
pub struct FormatProcessor {
    workspace_root: PathBuf,
    querier: SharedQuerier,
    sinks: SharedSinks,
    pacer: SharedPacer,
    formatter_template: String,
    delay: Duration,
    running: AtomicBool,
}

/// Holds the running flag for the duration of one run
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FormatProcessor {
    /// Create a processor that shells out to the configured tools.
    ///
    /// A relative `workspace_root` is made absolute against the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the status command line is empty or the current
    /// directory cannot be read.
    #[instrument(skip(config))]
    pub fn new(workspace_root: &Path, config: Config) -> Result<Self> {
        debug!(
            workspace_root = %workspace_root.display(),
            config = ?config,
            "Creating processor"
        );

        let workspace_root = absolute_root(workspace_root)?;
        let querier = StatusCli::from_command_line(&config.status_command)?;
        let sinks = ConsoleSinks {
            dry_run: config.dry_run,
            console: config.console,
            ..ConsoleSinks::default()
        };

        Ok(Self::with_parts(
            workspace_root,
            Box::new(querier),
            Box::new(sinks),
            Box::new(ThreadPacer),
        )
        .with_formatter(&config.formatter_template, config.delay))
    }

    /// Create a processor from explicit collaborators. `workspace_root` is used as given.
    #[must_use]
    pub fn with_parts(
        workspace_root: PathBuf,
        querier: SharedQuerier,
        sinks: SharedSinks,
        pacer: SharedPacer,
    ) -> Self {
        Self {
            workspace_root,
            querier,
            sinks,
            pacer,
            formatter_template: DEFAULT_FORMATTER_TEMPLATE.to_string(),
            delay: DEFAULT_DELAY,
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, template: &str, delay: Duration) -> Self {
        self.formatter_template = template.to_string();
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Lists modified files without formatting them.
    ///
    /// # Errors
    ///
    /// Returns an error if the status command fails.
    pub fn list_modified(&self) -> Result<Vec<ModifiedFileEntry>> {
        get_modified_files(self.querier.as_ref(), &self.workspace_root)
    }

    /// Formats every modified file and describes the outcome.
    #[instrument(skip(self), fields(workspace_root = %self.workspace_root.display()))]
    pub fn format_all(&self) -> Notification {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            debug!("Run already in progress");
            return Notification::warning("Formatting is already in progress.");
        };

        match self.run_format_all() {
            Ok(None) => Notification::info("No modified files found."),
            Ok(Some(report)) => completion_notification(&report),
            Err(err) => {
                error!(error = %err, "Formatting failed");
                Notification::error(format!("Formatting failed: {err}"))
            }
        }
    }

    fn run_format_all(&self) -> Result<Option<FormatReport>> {
        let entries = self.list_modified()?;
        if entries.is_empty() {
            debug!("No modified files");
            return Ok(None);
        }

        let mut sink = self.sinks.open(&self.workspace_root)?;
        sink.show()?;

        let formatter = self.formatter();
        let report = formatter.format_files(&entries, sink.as_mut(), self.pacer.as_ref())?;
        Ok(Some(report))
    }

    /// Formats a single file, the active document when one is given.
    #[instrument(skip(self), fields(path = ?path))]
    pub fn format_file(&self, path: Option<&Path>) -> Notification {
        let Some(path) = path else {
            return Notification::warning("No active file to format.");
        };
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            return Notification::warning("Formatting is already in progress.");
        };

        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let delivery = self.sinks.open(&self.workspace_root).and_then(|mut sink| {
            sink.show()?;
            self.formatter().format_one(&path, sink.as_mut())
        });

        match delivery {
            Ok(Delivery::Sent | Delivery::Completed) => {
                Notification::info(format!("Successfully formatted {}", path.display()))
            }
            Ok(Delivery::Failed { code }) => {
                let detail = code.map_or_else(
                    || "formatter was terminated".to_string(),
                    |code| format!("formatter exited with code {code}"),
                );
                error!(path = %path.display(), detail = %detail, "Error formatting file");
                Notification::error(format!("Error formatting file: {detail}"))
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "Error formatting file");
                Notification::error(format!("Error formatting file: {err}"))
            }
        }
    }

    fn formatter(&self) -> SequentialFormatter<'_> {
        SequentialFormatter::new(&self.workspace_root, &self.formatter_template, self.delay)
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn completion_notification(report: &FormatReport) -> Notification {
    let count = report.formatted;
    if report.failed.is_empty() {
        return Notification::info(format!(
            "Formatted {count} file{} successfully.",
            plural(count)
        ));
    }

    let failed = report
        .failed
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Notification::warning(format!(
        "Formatted {count} file{}, {} failed: {failed}",
        plural(count),
        report.failed.len()
    ))
}
