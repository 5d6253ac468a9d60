use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::sink::CommandSink;
use crate::types::{Delivery, FileStatus, FormatReport, ModifiedFileEntry};

pub const PATH_PLACEHOLDER: &str = "{path}";
pub const DEFAULT_FORMATTER_TEMPLATE: &str = "ya tool tt format \"{path}\"";
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Waits between formatter invocations
#[cfg_attr(test, mockall::automock)]
pub trait Pacer {
    fn pause(&self, delay: Duration);
}

/// Blocks the current thread for the delay
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Sends one formatter invocation per modified file to a sink, in order,
/// pausing for a fixed delay after each one.
pub struct SequentialFormatter<'a> {
    workspace_root: &'a Path,
    template: &'a str,
    delay: Duration,
}

impl<'a> SequentialFormatter<'a> {
    #[must_use]
    pub const fn new(workspace_root: &'a Path, template: &'a str, delay: Duration) -> Self {
        Self {
            workspace_root,
            template,
            delay,
        }
    }

    /// Formats every `Modified` entry.
    ///
    /// # Errors
    ///
    /// Returns the first sink error; no further invocations are sent after it.
    #[instrument(
        skip_all,
        fields(workspace_root = %self.workspace_root.display(), count = entries.len())
    )]
    pub fn format_files(
        &self,
        entries: &[ModifiedFileEntry],
        sink: &mut dyn CommandSink,
        pacer: &dyn Pacer,
    ) -> Result<FormatReport> {
        let mut report = FormatReport::default();

        for entry in entries {
            if entry.status != FileStatus::Modified {
                debug!(path = %entry.path.display(), status = ?entry.status, "Skipping entry");
                continue;
            }

            if let Delivery::Failed { code } = self.format_one(&entry.path, sink)? {
                warn!(path = %entry.path.display(), code = ?code, "Formatter failed");
                report.failed.push(entry.path.clone());
            }
            report.formatted += 1;

            pacer.pause(self.delay);
        }

        debug!(
            formatted = report.formatted,
            failed = report.failed.len(),
            "Formatting pass finished"
        );
        Ok(report)
    }

    /// Sends a single formatter invocation for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is unusable.
    pub fn format_one(&self, path: &Path, sink: &mut dyn CommandSink) -> Result<Delivery> {
        let relative = relative_to(self.workspace_root, path);
        let command = render_command(self.template, &relative);
        debug!(command = %command, "Sending formatter command");
        sink.send(&command)
    }
}

/// Fills the template with `relative_path`, wrapped by the template's own quoting.
///
/// Templates without a placeholder get the path appended in double quotes.
/// Quote characters inside the path are not escaped.
#[must_use]
pub fn render_command(template: &str, relative_path: &Path) -> String {
    let path = relative_path.to_string_lossy();
    if template.contains(PATH_PLACEHOLDER) {
        template.replace(PATH_PLACEHOLDER, &path)
    } else {
        format!("{template} \"{path}\"")
    }
}

/// Path of `path` as seen from `root`, climbing out with `..` when `path` is
/// not below it.
///
/// Both paths are compared component by component, so they should already be
/// normalized. When they share no starting point (an absolute and a relative
/// path, or different prefixes) `path` is returned unchanged.
#[must_use]
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    let root: Vec<Component<'_>> = root.components().collect();
    let target: Vec<Component<'_>> = path.components().collect();

    let common = root
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();
    let anchored = |components: &[Component<'_>]| {
        matches!(
            components.first(),
            Some(Component::RootDir | Component::Prefix(_))
        )
    };
    if common == 0 && (anchored(&root) || anchored(&target)) {
        return path.to_path_buf();
    }

    root[common..]
        .iter()
        .map(|_| Component::ParentDir)
        .chain(target[common..].iter().copied())
        .collect()
}
