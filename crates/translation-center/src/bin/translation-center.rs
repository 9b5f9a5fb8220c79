use std::{path::PathBuf, process};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use translation_center::{
    AppConfig, CoreError, EditorContext, FileStorage, HttpGateway, Layout, LocationTag,
    MemoryGateway,
    daemon::serve::{self, ServeArgs, resolve_layout},
    gateway::SyncGateway,
    storage::{StorageAdapter, StoreName},
};

#[derive(Parser, Debug)]
#[command(name = "translation-center", version, about = "Translation entry cache and editor daemon")]
struct Cli {
    /// Workspace root (defaults to $TRANSLATION_CENTER_ROOT or ~/.translation-center).
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the workspace directories and a default config file.
    Init,

    /// Run the daemon and its HTTP API.
    Serve(ServeArgs),

    /// Manage registered translation locations.
    Location {
        #[command(subcommand)]
        command: LocationCommand,
    },

    /// Inspect or reset persisted state records.
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Delete a record (location_store, translation_store or settings_store);
    /// defaults apply on the next load.
    Reset(StoreResetArgs),
}

#[derive(Args, Debug)]
struct StoreResetArgs {
    #[arg(value_name = "STORE")]
    name: String,
}

#[derive(Subcommand, Debug)]
enum LocationCommand {
    /// List registered locations.
    List,
    /// Register a location; the backend scans it unless --offline is given.
    Add(LocationAddArgs),
    /// Remove a location by name.
    Remove(LocationNameArgs),
    /// Toggle the favourite flag of a location.
    Favourite(LocationNameArgs),
}

#[derive(Args, Debug)]
struct LocationAddArgs {
    #[arg(value_name = "PATH")]
    path: PathBuf,
    #[arg(long)]
    name: String,
    #[arg(long, value_enum, default_value_t = TagArg::Fe)]
    tag: TagArg,
    /// Skip the backend scan; counters stay at zero until the next rescan.
    #[arg(long)]
    offline: bool,
}

#[derive(Args, Debug)]
struct LocationNameArgs {
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TagArg {
    Fe,
    Be,
}

impl From<TagArg> for LocationTag {
    fn from(value: TagArg) -> Self {
        match value {
            TagArg::Fe => LocationTag::Frontend,
            TagArg::Be => LocationTag::Backend,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => serve::run(cli.root, args).await,
        Command::Init => {
            let layout = resolve_layout(cli.root)?;
            handle_init(&layout)
        }
        Command::Location { command } => {
            let layout = resolve_layout(cli.root)?;
            handle_location_command(&layout, command).await
        }
        Command::Store { command } => {
            let layout = resolve_layout(cli.root)?;
            handle_store_command(&layout, command).await
        }
    }
}

async fn handle_store_command(layout: &Layout, command: StoreCommand) -> Result<()> {
    let storage = FileStorage::new(layout);
    match command {
        StoreCommand::Reset(args) => {
            let name: StoreName = args.name.parse()?;
            storage.remove(name).await?;
            println!("Reset {name}, defaults apply on next load");
            Ok(())
        }
    }
}

fn handle_init(layout: &Layout) -> Result<()> {
    layout.ensure()?;
    let config_path = layout.config_path();
    if config_path.exists() {
        println!("Workspace already initialized at {}", layout.root().display());
        return Ok(());
    }
    let written = AppConfig::default().write(layout)?;
    println!(
        "Initialized workspace at {}, config written to {}",
        layout.root().display(),
        written.display()
    );
    Ok(())
}

async fn handle_location_command(layout: &Layout, command: LocationCommand) -> Result<()> {
    layout.ensure()?;
    let config = AppConfig::load(layout)?;
    match command {
        LocationCommand::Add(args) if args.offline => {
            let context = open_context(layout, &config, MemoryGateway::default()).await?;
            handle_location_add(&context, args).await
        }
        command => {
            let gateway = HttpGateway::new(&config.backend_url, config.backend_token.clone())?;
            let context = open_context(layout, &config, gateway).await?;
            match command {
                LocationCommand::List => handle_location_list(&context).await,
                LocationCommand::Add(args) => handle_location_add(&context, args).await,
                LocationCommand::Remove(args) => {
                    let removed = context.remove_location(&args.name).await?;
                    println!("Removed location {} ({})", removed.name, removed.path);
                    Ok(())
                }
                LocationCommand::Favourite(args) => {
                    let favourite = context.toggle_favourite(&args.name).await?;
                    let state = if favourite { "marked as favourite" } else { "unmarked as favourite" };
                    println!("Location {} {state}", args.name);
                    Ok(())
                }
            }
        }
    }
}

async fn open_context<G: SyncGateway>(
    layout: &Layout,
    config: &AppConfig,
    gateway: G,
) -> Result<EditorContext<G, FileStorage>> {
    let context = EditorContext::new(gateway, FileStorage::new(layout), config.view);
    context.restore().await?;
    Ok(context)
}

async fn handle_location_list<G: SyncGateway>(context: &EditorContext<G, FileStorage>) -> Result<()> {
    let locations = context.locations().await;
    if locations.is_empty() {
        println!("No locations registered");
        return Ok(());
    }
    let active = context.active_location().await.map(|loc| loc.name);
    for location in locations {
        let marker = if active.as_deref() == Some(location.name.as_str()) { "*" } else { " " };
        let favourite = if location.is_favourite { " [favourite]" } else { "" };
        println!(
            "{marker} {} [{}] {} keys={} untranslated={}{favourite}",
            location.name,
            location.tag.as_str(),
            location.path,
            location.num_of_keys,
            location.num_of_untranslated_keys,
        );
    }
    Ok(())
}

async fn handle_location_add<G: SyncGateway>(
    context: &EditorContext<G, FileStorage>,
    args: LocationAddArgs,
) -> Result<()> {
    let Some(path) = args.path.to_str().map(str::to_string) else {
        bail!("location path must be valid UTF-8: {}", args.path.display());
    };
    let location = match context.add_location(&args.name, &path, args.tag.into()).await {
        Ok(location) => location,
        Err(err @ CoreError::Sync { .. }) => {
            bail!("{err}: {}; retry with --offline to register without scanning", source_of(&err))
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "Added location {} ({}) with {} keys, {} untranslated",
        location.name, location.path, location.num_of_keys, location.num_of_untranslated_keys
    );
    Ok(())
}

fn source_of(err: &CoreError) -> String {
    std::error::Error::source(err).map(|source| source.to_string()).unwrap_or_default()
}
