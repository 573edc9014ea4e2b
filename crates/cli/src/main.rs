use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use grouping_interaction::InteractionError;
use grouping_records::StoreError;
use serde::Serialize;
use serde_json::{json, Value};
use settings::GroupingSettings;
use std::io;
use std::path::{Path, PathBuf};

mod commands;
mod host;
mod settings;
mod view;

use commands::Workspace;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "entry-groups")]
#[command(about = "Named groups over prompt and world-info entry lists", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Host data file
    #[arg(long, global = true, default_value = "entry-groups.json")]
    data: PathBuf,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a host data file with one prompt container
    Init(InitArgs),
    /// List the groups of a container with their resolution
    List(ContainerArgs),
    /// Create a group between two entries
    Add(AddArgs),
    /// Rename a group or move its anchors
    Update(UpdateArgs),
    /// Delete a group
    Remove(IndexArgs),
    /// Rewrite stored groups, upgrading positional records where possible
    Migrate(ContainerArgs),
    /// Flip the enabled state of every member of a group
    Toggle(IndexArgs),
    /// Run one synchronization pass and print the grouped entry list
    Render(ContainerArgs),
    /// Print the effective settings
    Config,
    /// Sections of a world book
    WiList(WiListArgs),
    /// Create a world-info group
    WiCreate(WiNameArgs),
    /// Tag an entry with a group
    WiAdd(WiEntryArgs),
    /// Remove an entry from its group
    WiRemove(WiUidArgs),
    /// Move a group to another display position
    WiMove(WiMoveArgs),
    /// Rename a world-info group
    WiRename(WiRenameArgs),
    /// Delete a world-info group; its entries become ungrouped
    WiDelete(WiGroupArgs),
    /// Flip the collapsed flag of one group
    WiToggle(WiGroupArgs),
    /// Collapse every group of a book
    WiCollapseAll(BookArgs),
    /// Expand every group of a book
    WiExpandAll(BookArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Name of the prompt container
    #[arg(long, default_value = "Default")]
    container: String,

    /// Entry identifiers in display order
    #[arg(long, value_delimiter = ',', required = true)]
    keys: Vec<String>,

    /// Overwrite an existing data file
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ContainerArgs {
    /// Container name (defaults to the active one)
    #[arg(long)]
    container: Option<String>,
}

#[derive(Args)]
struct AddArgs {
    #[command(flatten)]
    target: ContainerArgs,

    /// Identifier of the first entry
    start: String,

    /// Identifier of the last entry
    end: String,

    /// Group name
    name: String,
}

#[derive(Args)]
struct IndexArgs {
    #[command(flatten)]
    target: ContainerArgs,

    /// Position in the container's group list
    #[arg(allow_negative_numbers = true)]
    index: i64,
}

#[derive(Args)]
struct UpdateArgs {
    #[command(flatten)]
    target: IndexArgs,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    end: Option<String>,
}

#[derive(Args)]
struct BookArgs {
    /// World book name
    #[arg(long)]
    book: String,
}

#[derive(Args)]
struct WiListArgs {
    #[command(flatten)]
    book: BookArgs,

    /// Entry uids in display order (defaults to the book's stored order)
    #[arg(long, value_delimiter = ',')]
    entries: Option<Vec<u64>>,
}

#[derive(Args)]
struct WiNameArgs {
    #[command(flatten)]
    book: BookArgs,

    name: String,
}

#[derive(Args)]
struct WiGroupArgs {
    #[command(flatten)]
    book: BookArgs,

    /// Group id
    id: String,
}

#[derive(Args)]
struct WiEntryArgs {
    #[command(flatten)]
    book: BookArgs,

    /// Group id
    id: String,

    /// Entry uid
    uid: u64,
}

#[derive(Args)]
struct WiUidArgs {
    #[command(flatten)]
    book: BookArgs,

    /// Entry uid
    uid: u64,
}

#[derive(Args)]
struct WiMoveArgs {
    #[command(flatten)]
    book: BookArgs,

    from: usize,

    to: usize,
}

#[derive(Args)]
struct WiRenameArgs {
    #[command(flatten)]
    book: BookArgs,

    id: String,

    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let pretty = cli.pretty;
    let envelope = match run(cli).await {
        Ok(data) => json!({ "status": "ok", "data": data }),
        Err(err) => {
            log::debug!("command failed: {err:?}");
            json!({
                "status": "error",
                "kind": error_kind(&err),
                "message": format!("{err:#}"),
            })
        }
    };
    let failed = envelope["status"] == "error";
    let text = if pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    print_stdout(&text)?;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<Value> {
    let settings = GroupingSettings::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Init(args) => commands::run_init(&cli.data, &args.container, &args.keys, args.force),
        Commands::Config => commands::run_config(&settings),
        command => {
            let ws = Workspace::open(&cli.data, settings)?;
            run_with_workspace(&ws, command, &cli.data).await
        }
    }
}

async fn run_with_workspace(ws: &Workspace, command: Commands, data: &Path) -> Result<Value> {
    log::debug!("using host file {}", data.display());
    match command {
        Commands::List(args) => to_value(commands::run_list(ws, args.container.as_deref())?),
        Commands::Add(args) => {
            commands::run_add(
                ws,
                args.target.container.as_deref(),
                &args.start,
                &args.end,
                &args.name,
            )
            .await
        }
        Commands::Update(args) => {
            commands::run_update(
                ws,
                args.target.target.container.as_deref(),
                args.target.index,
                args.name,
                args.start,
                args.end,
            )
            .await
        }
        Commands::Remove(args) => {
            commands::run_remove(ws, args.target.container.as_deref(), args.index).await
        }
        Commands::Migrate(args) => commands::run_migrate(ws, args.container.as_deref()).await,
        Commands::Toggle(args) => to_value(
            commands::run_toggle(ws, args.target.container.as_deref(), args.index).await?,
        ),
        Commands::Render(args) => to_value(commands::run_render(ws, args.container.as_deref())?),
        Commands::WiList(args) => to_value(commands::run_wi_list(ws, &args.book.book, args.entries)?),
        Commands::WiCreate(args) => commands::run_wi_create(ws, &args.book.book, &args.name).await,
        Commands::WiAdd(args) => {
            commands::run_wi_add(ws, &args.book.book, &args.id, args.uid).await
        }
        Commands::WiRemove(args) => commands::run_wi_remove(ws, &args.book.book, args.uid).await,
        Commands::WiMove(args) => {
            commands::run_wi_move(ws, &args.book.book, args.from, args.to).await
        }
        Commands::WiRename(args) => {
            commands::run_wi_rename(ws, &args.book.book, &args.id, &args.name).await
        }
        Commands::WiDelete(args) => commands::run_wi_delete(ws, &args.book.book, &args.id).await,
        Commands::WiToggle(args) => commands::run_wi_toggle(ws, &args.book.book, &args.id).await,
        Commands::WiCollapseAll(args) => commands::run_wi_collapse_all(ws, &args.book, true).await,
        Commands::WiExpandAll(args) => commands::run_wi_collapse_all(ws, &args.book, false).await,
        Commands::Init(_) | Commands::Config => {
            anyhow::bail!("command does not take a host file")
        }
    }
}

fn to_value(out: impl Serialize) -> Result<Value> {
    Ok(serde_json::to_value(out)?)
}

/// Stable machine-readable error class for the JSON envelope.
fn error_kind(err: &anyhow::Error) -> &'static str {
    let store = err.downcast_ref::<StoreError>().or_else(|| {
        match err.downcast_ref::<InteractionError>() {
            Some(InteractionError::Store(inner)) => Some(inner),
            _ => None,
        }
    });
    if let Some(store) = store {
        return match store {
            StoreError::Validation(_) => "validation",
            StoreError::IndexOutOfRange { .. } => "index_out_of_range",
            StoreError::ContainerNotFound(_) => "container_not_found",
            StoreError::GroupNotFound(_) => "group_not_found",
            StoreError::Host(_) => "host",
            StoreError::Serialization(_) => "serialization",
        };
    }
    match err.downcast_ref::<InteractionError>() {
        Some(InteractionError::AlreadyGrouped(_)) => "already_grouped",
        Some(InteractionError::Overlap { .. }) => "overlap",
        Some(InteractionError::Unresolvable) => "unresolvable",
        Some(InteractionError::MarksIncomplete) => "marks_incomplete",
        Some(InteractionError::Host(_)) => "host",
        Some(InteractionError::Store(_)) | None => "internal",
    }
}
