use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use dbctl_core::PlaygroundDefaults;
use dbctl_describe::{DescribeError, DescribeRequest, Describer, Scope};
use dbctl_kubehub::KubeClusterClient;
use tracing::{info, warn};

mod render;

use render::{Output, Printer};

#[derive(Parser, Debug)]
#[command(name = "dbctl", version, about = "Database cluster CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: current context)
    #[arg(short = 'n', long = "ns", visible_alias = "namespace", global = true)]
    namespace: Option<String>,

    /// Resource type describing a database cluster
    #[arg(long = "resource", env = "DBCTL_RESOURCE", global = true, default_value = "innodbclusters")]
    resource: String,

    /// API group of the resource type
    #[arg(long = "group", env = "DBCTL_GROUP", global = true, default_value = "mysql.oracle.com")]
    group: String,

    #[command(flatten)]
    defaults: DefaultsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Values the cluster object does not carry.
#[derive(Args, Debug)]
struct DefaultsArgs {
    #[arg(long = "root-user", env = "DBCTL_ROOT_USER", global = true, default_value = "root", hide = true)]
    root_user: String,
    #[arg(long = "port", env = "DBCTL_PORT", global = true, default_value_t = 3306, hide = true)]
    port: u16,
    #[arg(long = "engine", env = "DBCTL_ENGINE", global = true, default_value = "mysql", hide = true)]
    engine: String,
}

impl From<DefaultsArgs> for PlaygroundDefaults {
    fn from(v: DefaultsArgs) -> Self {
        Self { root_user: v.root_user, port: v.port, engine: v.engine }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe database cluster info
    Describe {
        /// Cluster names
        names: Vec<String>,
        /// Look in every namespace
        #[arg(short = 'A', long = "all-namespaces", action = ArgAction::SetTrue)]
        all_namespaces: bool,
        /// Items per list request; 0 disables chunking
        #[arg(long = "chunk-size", env = "DBCTL_CHUNK_SIZE", default_value_t = 500)]
        chunk_size: u32,
    },
}

fn init_tracing() {
    let env = std::env::var("DBCTL_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("DBCTL_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid DBCTL_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let defaults = PlaygroundDefaults::from(cli.defaults);

    match cli.command {
        Commands::Describe { names, all_namespaces, chunk_size } => {
            if names.is_empty() {
                return Err(DescribeError::MissingName.into());
            }
            let client = KubeClusterClient::connect(&cli.group).await.context("connecting to cluster")?;
            let scope = if all_namespaces {
                Scope::AllNamespaces
            } else {
                Scope::Namespace(cli.namespace.clone().unwrap_or_else(|| client.default_namespace().to_string()))
            };
            info!(resource = %cli.resource, scope = ?scope, names = ?names, "describe invoked");
            let req = DescribeRequest { type_hint: cli.resource.clone(), scope, names, chunk_size };

            let mut printer = Printer::stdio(cli.output);
            let outcome = Describer::new(&client, defaults).describe(&req, &mut printer).await?;
            if let Err(errors) = outcome.errors.into_result() {
                warn!(count = errors.len(), emitted = outcome.emitted, "describe finished with errors");
                return Err(anyhow!(errors));
            }
        }
    }

    Ok(())
}
