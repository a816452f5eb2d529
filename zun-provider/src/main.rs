//! zun-provider: run a single resource operation against OpenStack Zun.
//!
//! Resource state is exchanged as JSON (`{"id": ..., "attributes": {...},
//! "timeouts": {...}}`), read from a file or stdin and written to stdout
//! after the operation completes.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zun_provider::models::DeleteMode;
use zun_provider::{PollTuning, ProviderConfig, ResourceData, ResourceKind};

/// OpenStack Zun resource driver
#[derive(Parser, Debug)]
#[command(name = "zun-provider", version, about)]
struct Args {
    /// Container service endpoint (e.g., http://controller:9517/v1)
    #[arg(long)]
    endpoint: String,

    /// Keystone token (defaults to $OS_AUTH_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Region recorded on resources that do not set one
    #[arg(long, default_value = "")]
    region: String,

    /// Container API microversion
    #[arg(long, default_value = zun_provider::config::DEFAULT_MICROVERSION)]
    microversion: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "60")]
    request_timeout: u64,

    /// Override the wait before the first status poll (milliseconds)
    #[arg(long)]
    poll_delay_ms: Option<u64>,

    /// Override the minimum spacing between status polls (milliseconds)
    #[arg(long)]
    poll_min_timeout_ms: Option<u64>,

    /// Poll at a fixed interval instead of backing off (milliseconds)
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// How containers are deleted
    #[arg(long, value_enum, default_value = "plain")]
    delete_mode: DeleteModeArg,

    /// Fail interface detach on HTTP 400 instead of waiting
    #[arg(long)]
    strict_detach: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a resource from a state document
    Create {
        /// Resource type (e.g., openstack_container_container_v1)
        #[arg(long = "type")]
        kind: String,
        /// State file, or "-" for stdin
        #[arg(long, default_value = "-")]
        state: String,
    },
    /// Refresh a resource's attributes
    Read {
        #[arg(long = "type")]
        kind: String,
        #[arg(long, default_value = "-")]
        state: String,
    },
    /// Delete a resource
    Delete {
        #[arg(long = "type")]
        kind: String,
        #[arg(long, default_value = "-")]
        state: String,
    },
    /// Import an existing resource by id
    Import {
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        id: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeleteModeArg {
    Plain,
    Stop,
    Force,
}

impl From<DeleteModeArg> for DeleteMode {
    fn from(arg: DeleteModeArg) -> Self {
        match arg {
            DeleteModeArg::Plain => DeleteMode::Plain,
            DeleteModeArg::Stop => DeleteMode::Stop,
            DeleteModeArg::Force => DeleteMode::Force,
        }
    }
}

impl Args {
    fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new(&self.endpoint)
            .with_region(&self.region)
            .with_poll(PollTuning {
                delay: self.poll_delay_ms.map(Duration::from_millis),
                min_timeout: self.poll_min_timeout_ms.map(Duration::from_millis),
                interval: self.poll_interval_ms.map(Duration::from_millis),
            });
        if let Some(token) = self
            .token
            .clone()
            .or_else(|| std::env::var("OS_AUTH_TOKEN").ok())
        {
            config = config.with_token(token);
        }
        config.microversion = self.microversion.clone();
        config.request_timeout = Duration::from_secs(self.request_timeout);
        config.container_delete_mode = self.delete_mode.into();
        config.strict_detach = self.strict_detach;
        config
    }
}

async fn load_state(path: &str) -> Result<ResourceData> {
    let raw = if path == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read state from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read state file {}", path))?
    };
    serde_json::from_str(&raw).context("Invalid state document")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the resulting state.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zun_provider=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.provider_config();
    info!("Zun endpoint: {}", config.endpoint);

    let (kind, state) = match &args.command {
        Command::Create { kind, state }
        | Command::Read { kind, state }
        | Command::Delete { kind, state } => (kind, Some(state)),
        Command::Import { kind, .. } => (kind, None),
    };
    let kind: ResourceKind = kind.parse()?;
    let resource = kind
        .build(&config)
        .context("Failed to set up Zun client")?;

    let mut data = match state {
        Some(path) => load_state(path).await?,
        None => ResourceData::new(),
    };

    match &args.command {
        Command::Create { .. } => {
            info!("Creating {}", kind);
            resource.create(&mut data).await?;
        }
        Command::Read { .. } => {
            resource.read(&mut data).await?;
        }
        Command::Delete { .. } => {
            info!("Deleting {} {}", kind, data.id());
            resource.delete(&mut data).await?;
        }
        Command::Import { id, .. } => {
            data = resource.import(id).await?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
