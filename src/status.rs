use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::{FileStatus, ModifiedFileEntry};

const MODIFIED_MARKER: &str = "modified:";

/// Source of version-control status output for a workspace
#[cfg_attr(test, mockall::automock)]
pub trait StatusQuerier {
    /// Run the status command in `workspace_root` and return its standard output
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be launched or exits unsuccessfully
    fn query_status(&self, workspace_root: &Path) -> Result<String>;
}

/// Status querier backed by an external command line, `arc status` by default
#[derive(Debug, Clone)]
pub struct StatusCli {
    program: String,
    args: Vec<String>,
}

impl StatusCli {
    /// Builds a querier from a whitespace separated command line such as `arc status`
    ///
    /// # Errors
    ///
    /// Returns an error if the command line is empty
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(ToString::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::StatusCommand("status command is empty".to_string()))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Default for StatusCli {
    fn default() -> Self {
        Self {
            program: "arc".to_string(),
            args: vec!["status".to_string()],
        }
    }
}

impl StatusQuerier for StatusCli {
    #[instrument(
        skip(self),
        fields(
            program = %self.program,
            args = ?self.args,
            workspace_root = %workspace_root.display()
        )
    )]
    fn query_status(&self, workspace_root: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workspace_root)
            .output()
            .map_err(|e| Error::StatusCommand(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            debug!(error = %error, status = %output.status, "Status command failed");
            let error = error.trim();
            return Err(Error::StatusCommand(if error.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                error.to_string()
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            output_length = stdout.len(),
            "Status command completed successfully"
        );
        Ok(stdout)
    }
}

/// Queries `querier` and returns the files it reports as modified, in the order
/// the tool printed them.
///
/// # Errors
///
/// Returns an error if the status command fails.
#[instrument(skip(querier), fields(workspace_root = %workspace_root.display()))]
pub fn get_modified_files(
    querier: &(impl StatusQuerier + ?Sized),
    workspace_root: &Path,
) -> Result<Vec<ModifiedFileEntry>> {
    let output = querier.query_status(workspace_root)?;
    let entries = parse_status(&output, workspace_root);
    debug!(count = entries.len(), "Modified files discovered");
    Ok(entries)
}

/// Extracts `modified:` entries from status output.
///
/// The text following the marker is trimmed and resolved against
/// `workspace_root`. A marker with nothing after it resolves to the root.
#[must_use]
pub fn parse_status(output: &str, workspace_root: &Path) -> Vec<ModifiedFileEntry> {
    output
        .lines()
        .filter(|line| line.contains(MODIFIED_MARKER))
        .map(|line| {
            let relative = line
                .split(MODIFIED_MARKER)
                .nth(1)
                .unwrap_or_default()
                .trim();
            ModifiedFileEntry {
                path: resolve(workspace_root, relative),
                status: FileStatus::Modified,
            }
        })
        .collect()
}

/// Makes `workspace_root` absolute against the current directory and folds
/// its `.` and `..` components. An empty root stays empty.
///
/// # Errors
///
/// Returns an error if the current directory cannot be read.
pub fn absolute_root(workspace_root: &Path) -> Result<PathBuf> {
    if workspace_root.as_os_str().is_empty() {
        return Ok(PathBuf::new());
    }
    let absolute = std::path::absolute(workspace_root)?;
    Ok(resolve(&absolute, ""))
}

/// Lexically joins `relative` onto `root`, dropping `.` and folding `..`.
///
/// A `..` with no normal component left to remove is kept, except directly
/// below the filesystem root where it has nowhere to go.
pub(crate) fn resolve(root: &Path, relative: &str) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in root.join(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match resolved.components().next_back() {
                Some(Component::Normal(_)) => {
                    resolved.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => resolved.push(Component::ParentDir.as_os_str()),
            },
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}
