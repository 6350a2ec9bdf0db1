use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use glyphd::config::Config;
use glyphd::display;
use glyphd::ha::HaClient;
use glyphd::ha::Service;
use glyphd::ha::StateClient;
use glyphd::ha::normalize_url;
use glyphd::monitor::Monitor;
use glyphd::monitor::MonitorOptions;
use glyphd::router::EventRouter;
use glyphd::settings::Settings;
use glyphd::settings::SettingsStore;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(version, about = "Mirror a Home Assistant entity on a glyph matrix")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "glyphd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the display daemon (default)
    Run,
    /// Check credentials against the server and store them
    Login {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
    },
    /// List entities
    Entities {
        /// Include entities that cannot be toggled
        #[arg(long)]
        all: bool,
        /// Filter by name or id
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Choose the entity shown on the display
    Select { entity_id: String },
    /// Toggle an entity (the selected one by default)
    Toggle { entity_id: Option<String> },
    /// Turn an entity on
    On { entity_id: Option<String> },
    /// Turn an entity off
    Off { entity_id: Option<String> },
    /// Forget the stored credentials and selection
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_file_or_default(&cli.config)?;
    init_logging(&config);

    let store = SettingsStore::new(&config.settings.path);
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, store).await,
        Command::Login { url, token } => login(&config, &store, &url, &token).await,
        Command::Entities { all, query } => {
            list_entities(&config, &store, all, query.as_deref()).await
        }
        Command::Select { entity_id } => select(&config, &store, &entity_id).await,
        Command::Toggle { entity_id } => {
            call(&config, &store, Service::Toggle, entity_id).await
        }
        Command::On { entity_id } => call(&config, &store, Service::TurnOn, entity_id).await,
        Command::Off { entity_id } => call(&config, &store, Service::TurnOff, entity_id).await,
        Command::Logout => {
            store.clear()?;
            println!("Logged out");
            Ok(())
        }
    }
}

fn init_logging(config: &Config) {
    let filter = config.logging.overrides.iter().fold(
        Targets::new().with_default(LevelFilter::from(config.logging.level)),
        |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

async fn run(config: Config, store: SettingsStore) -> anyhow::Result<()> {
    tracing::info!("glyphd starting");

    let driver = display::driver_from_config(&config)?;
    let client: Arc<dyn StateClient> = Arc::new(HaClient::new(&config.http)?);

    let (hardware, events) = EventRouter::channel();
    let (monitor, handle) = Monitor::new(
        MonitorOptions::from_config(&config),
        driver,
        client,
        store,
        hardware,
    );
    let router = EventRouter::new(events, handle.clone());

    let monitor_task = tokio::spawn(monitor.run());
    let router_task = tokio::spawn(router.run());
    handle.activate();

    tracing::info!("Press Ctrl+C to exit");
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    handle.teardown();
    monitor_task.await?;
    router_task.abort();

    tracing::info!("glyphd shutdown complete");
    Ok(())
}

/// Client for one-shot commands, configured from the stored credentials.
fn connected_client(config: &Config, settings: &Settings) -> anyhow::Result<HaClient> {
    let Some((url, token)) = settings.credentials() else {
        bail!("Not configured, run `glyphd login` first");
    };
    let client = HaClient::new(&config.http)?;
    client.configure(url, token);
    Ok(client)
}

async fn login(config: &Config, store: &SettingsStore, url: &str, token: &str) -> anyhow::Result<()> {
    let url = normalize_url(url);
    let client = HaClient::new(&config.http)?;
    client.configure(&url, token);

    if let Err(e) = client.probe().await {
        bail!("Could not connect to {}: {}", url, e);
    }

    let mut settings = store.load()?;
    settings.set_credentials(url.as_str(), token);
    store.save(&settings)?;
    println!("Connected to {}", url);
    Ok(())
}

async fn list_entities(
    config: &Config,
    store: &SettingsStore,
    all: bool,
    query: Option<&str>,
) -> anyhow::Result<()> {
    let settings = store.load()?;
    let client = connected_client(config, &settings)?;

    let mut entities = client.states().await?;
    entities.retain(|e| (all || e.is_controllable()) && e.matches(query.unwrap_or("")));
    entities.sort_by(|a, b| a.display_name().cmp(b.display_name()));

    let selected = settings.selected_entity();
    for entity in &entities {
        let marker = if Some(entity.entity_id.as_str()) == selected { "*" } else { " " };
        println!(
            "{} {:<40} {:<12} {}",
            marker,
            entity.entity_id,
            entity.state,
            entity.display_name()
        );
    }
    if entities.is_empty() {
        println!("No matching entities");
    }
    Ok(())
}

async fn select(config: &Config, store: &SettingsStore, entity_id: &str) -> anyhow::Result<()> {
    let mut settings = store.load()?;
    let client = connected_client(config, &settings)?;

    let entity = client
        .entity_state(entity_id)
        .await
        .with_context(|| format!("Cannot select {}", entity_id))?;
    settings.select_entity(entity.entity_id.as_str(), entity.display_name());
    store.save(&settings)?;
    println!("Selected {} ({})", entity.display_name(), entity.entity_id);
    Ok(())
}

async fn call(
    config: &Config,
    store: &SettingsStore,
    service: Service,
    entity_id: Option<String>,
) -> anyhow::Result<()> {
    let settings = store.load()?;
    let client = connected_client(config, &settings)?;

    let Some(entity_id) = entity_id.or_else(|| settings.selected_entity().map(str::to_string))
    else {
        bail!("No entity given and none selected");
    };
    client.call_service(service, &entity_id).await?;
    println!("{} {}", service, entity_id);
    Ok(())
}
