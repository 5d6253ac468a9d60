pub use error::{Error, Result};
pub use message::{handle_line, PanelMessage};
pub use processor::{Config, FormatProcessor};
pub use types::{
    Delivery, FileStatus, FormatReport, ModifiedFileEntry, Notification, NotificationLevel,
};

use std::path::Path;

mod error;
pub mod formatter;
mod message;
pub mod processor;
pub mod sink;
pub mod status;
#[cfg(test)]
mod testing;
mod types;

/// Creates a new `FormatProcessor` for a workspace using the real status and formatter tools.
///
/// # Arguments
///
/// * `workspace_root`: The directory the status command runs in and paths are relative to.
/// * `config`: Commands, delay and dry-run setting.
///
/// # Errors
///
/// Returns an error if the status command line is empty.
pub fn new(workspace_root: &Path, config: Config) -> Result<FormatProcessor> {
    FormatProcessor::new(workspace_root, config)
}

/// Lists the files the status command reports as modified under `workspace_root`.
///
/// A relative `workspace_root` is made absolute against the current directory,
/// so the returned paths are always absolute.
///
/// # Errors
///
/// Returns an error if the status command cannot be run or fails.
pub fn modified_files(
    workspace_root: &Path,
    status_command: &str,
) -> Result<Vec<ModifiedFileEntry>> {
    let workspace_root = status::absolute_root(workspace_root)?;
    let querier = status::StatusCli::from_command_line(status_command)?;
    status::get_modified_files(&querier, &workspace_root)
}
