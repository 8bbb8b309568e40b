use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tag_aggregator::sources::build_sources;
use tag_aggregator::{
    Destination, EngineConfig, LogNotifier, MemorySubscriptionStore, PgSubscriptionStore,
    SourceAggregator, SubscriptionService, SubscriptionStore,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tag-aggregator", about = "Tag search subscriptions across image sites")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `database_url` and DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Overrides `poller_latency_ms`
    #[arg(long, global = true)]
    poller_latency_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one random item matching the query
    Random {
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Subscribe a destination to a query
    Subscribe {
        query: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the queries a destination is subscribed to
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Remove a subscription
    Remove {
        query: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Poll subscriptions until interrupted
    Run,
}

impl Command {
    /// Changes that only matter if a later `run` process can see them.
    fn needs_persistent_store(&self) -> bool {
        matches!(self, Command::Subscribe { .. } | Command::Remove { .. })
    }
}

/// Reject commands whose effect would vanish with an in-memory store.
fn check_store_for(command: &Command, config: &EngineConfig) -> anyhow::Result<()> {
    if config.database_url.is_none() && command.needs_persistent_store() {
        bail!("this command changes subscriptions and needs a database: set DATABASE_URL or pass --database-url");
    }
    Ok(())
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Direct-message subscriber
    #[arg(long, conflicts_with_all = ["guild", "channel"])]
    user: Option<u64>,
    #[arg(long, requires = "channel")]
    guild: Option<u64>,
    #[arg(long, requires = "guild")]
    channel: Option<u64>,
}

impl TargetArgs {
    fn destination(&self) -> anyhow::Result<Destination> {
        match (self.user, self.guild, self.channel) {
            (Some(user_id), None, None) => Ok(Destination::Direct { user_id }),
            (None, Some(guild_id), Some(channel_id)) => Ok(Destination::Channel { guild_id, channel_id }),
            _ => bail!("pass either --user or both --guild and --channel"),
        }
    }
}

async fn open_store(config: &EngineConfig) -> anyhow::Result<Arc<dyn SubscriptionStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgSubscriptionStore::connect(url)
                .await
                .context("failed to connect to the subscription database")?;
            store.setup_schema().await?;
            info!("Using Postgres subscription store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database configured; subscriptions live in memory and are lost when this process exits");
            Ok(Arc::new(MemorySubscriptionStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(latency) = cli.poller_latency_ms {
        config.poller_latency_ms = latency;
    }

    check_store_for(&cli.command, &config)?;

    let aggregator = Arc::new(SourceAggregator::new(build_sources(&config)?));
    let store = open_store(&config).await?;
    let service = SubscriptionService::new(aggregator, store, Arc::new(LogNotifier), config);

    match cli.command {
        Command::Random { query } => {
            println!("{}", service.get_random_item(&query.join(" ")).await);
        }
        Command::Subscribe { query, target } => {
            let outcome = service.subscribe(&query, &target.destination()?).await?;
            println!("{:?}", outcome);
        }
        Command::List { target } => {
            for query in service.list_subscriptions(&target.destination()?.scope_key()).await? {
                println!("{}", query);
            }
        }
        Command::Remove { query, target } => {
            let outcome = service
                .remove_subscription(&query, &target.destination()?.scope_key())
                .await?;
            println!("{:?}", outcome);
        }
        Command::Run => {
            let poller = service.start_polling();
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            poller.abort();
            if let Err(e) = poller.await {
                if !e.is_cancelled() {
                    error!("Poller task ended abnormally: {}", e);
                }
            }
        }
    }

    Ok(())
}
