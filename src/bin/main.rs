use arc_format::formatter::DEFAULT_FORMATTER_TEMPLATE;
use arc_format::sink::Console;
use arc_format::{self, Config, FormatProcessor, Notification, NotificationLevel};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Workspace root (defaults to the current directory)
    #[arg(global = true, short, long)]
    workspace: Option<PathBuf>,

    /// Command that prints the working copy status
    #[arg(global = true, long, default_value = "arc status")]
    status_command: String,

    /// Formatter command; `{path}` is replaced by the file path relative to the workspace
    #[arg(global = true, short, long, default_value = DEFAULT_FORMATTER_TEMPLATE)]
    formatter: String,

    /// Pause after each formatter invocation, in milliseconds
    #[arg(global = true, short, long, default_value_t = 1000)]
    delay_ms: u64,

    /// Print formatter commands instead of running them
    #[arg(global = true, long)]
    dry_run: bool,

    /// Log level
    #[arg(global = true, short, long, default_value = "error")]
    log: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    /// Format every file the status command reports as modified
    FormatAll,
    /// Format a single file
    FormatFile {
        /// File to format, absolute or relative to the workspace
        path: Option<PathBuf>,
    },
    /// List modified files without formatting them
    List {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read panel messages as JSON lines from stdin and answer with notifications
    Listen,
}

fn print_notification(notification: &Notification) {
    match notification.level {
        NotificationLevel::Info => println!("✅ {}", notification.message),
        NotificationLevel::Warning => println!("⚠️  {}", notification.message),
        NotificationLevel::Error => eprintln!("❌ {}", notification.message),
    }
}

fn print_modified_files(entries: &[arc_format::ModifiedFileEntry]) {
    println!("\n📊 Modified Files:");
    println!("==================");
    println!("Total files: {}", entries.len());
    for entry in entries {
        println!("  ~ {}", entry.path.display());
    }
}

fn exit_code(notification: &Notification) -> ExitCode {
    if notification.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_blocking<F>(processor: &Arc<FormatProcessor>, action: F) -> Notification
where
    F: FnOnce(&FormatProcessor) -> Notification + Send + 'static,
{
    let processor = Arc::clone(processor);
    tokio::task::spawn_blocking(move || action(&processor))
        .await
        .unwrap_or_else(|err| Notification::error(format!("Formatting failed: {err}")))
}

async fn listen(processor: Arc<FormatProcessor>) -> arc_format::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        debug!(message = %line, "Panel message received");

        while tasks.try_join_next().is_some() {}

        let processor = Arc::clone(&processor);
        tasks.spawn_blocking(move || {
            let notification = arc_format::handle_line(&line, &processor);
            match serde_json::to_string(&notification) {
                Ok(json) => println!("{json}"),
                Err(err) => tracing::error!(error = %err, "Could not encode notification"),
            }
        });
    }

    while tasks.join_next().await.is_some() {}
    Ok(())
}

#[tokio::main]
async fn main() -> arc_format::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive(cli.log.into());

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .pretty()
        .init();

    let workspace = cli
        .workspace
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let config = Config {
        status_command: cli.status_command,
        formatter_template: cli.formatter,
        delay: Duration::from_millis(cli.delay_ms),
        dry_run: cli.dry_run,
        console: if matches!(cli.command, Command::Listen) {
            Console::Stderr
        } else {
            Console::Stdout
        },
    };
    debug!(workspace = %workspace.display(), "Using workspace");

    let processor = Arc::new(arc_format::new(&workspace, config)?);

    let notification = match cli.command {
        Command::FormatAll => run_blocking(&processor, FormatProcessor::format_all).await,
        Command::FormatFile { path } => {
            run_blocking(&processor, move |processor| {
                processor.format_file(path.as_deref())
            })
            .await
        }
        Command::List { json } => {
            let entries = processor.list_modified()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_modified_files(&entries);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Listen => {
            listen(processor).await?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    print_notification(&notification);
    Ok(exit_code(&notification))
}
