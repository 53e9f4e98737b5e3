//! prodstore-cli - Command-line interface for prodstore
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod form;
mod repl;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use prodstore_client::{Client, Connection, ConnectionConfig, Reconnector, SessionEvent};
use prodstore_protocol::{Coordinates, Framing, NewProduct, UnitOfMeasure};
use prodstore_transport::TransportConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prodstore-cli")]
#[command(about = "Command-line interface for the prodstore product collection server")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Server address (host:port)
    #[arg(short, long, env = "PRODSTORE_SERVER", default_value_t = default_server())]
    server: String,

    /// Chunk framing used on the wire (marker or sequenced)
    #[arg(long, env = "PRODSTORE_FRAMING", default_value = "marker")]
    framing: Framing,

    /// Maximum datagram size in bytes
    #[arg(long, env = "PRODSTORE_PACKET_SIZE", default_value_t = prodstore_protocol::PACKET_SIZE)]
    packet_size: usize,

    /// Liveness probe timeout in milliseconds
    #[arg(long, env = "PRODSTORE_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[arg(long, env = "PRODSTORE_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    request_timeout_ms: u64,

    /// Pause between reconnection attempts in milliseconds
    #[arg(long, env = "PRODSTORE_RETRY_INTERVAL_MS", default_value_t = 1000)]
    retry_interval_ms: u64,

    /// Report the connection as lost after this many milliseconds of failures
    #[arg(long, env = "PRODSTORE_LOST_THRESHOLD_MS", default_value_t = 30000)]
    lost_threshold_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start interactive REPL
    Repl,

    /// Check that the server answers
    Ping,

    /// List the commands the server supports
    Help,

    /// Show collection type, init date and size
    Info,

    /// List all products
    Show,

    /// Add a product
    Add(ProductArgs),

    /// Replace the fields of a product
    Update {
        /// Product id
        id: u64,

        #[command(flatten)]
        product: ProductArgs,
    },

    /// Remove a product by id
    RemoveById {
        /// Product id
        id: u64,
    },

    /// Remove all products
    Clear,

    /// Show the first product
    Head,

    /// Add a product if its price exceeds every stored price
    AddIfMax(ProductArgs),

    /// Add a product if its price is below every stored price
    AddIfMin(ProductArgs),

    /// Sum the prices of all products
    SumOfPrice,

    /// List products with the given price
    FilterByPrice {
        price: f64,
    },

    /// List products whose part number contains the given text
    FilterContainsPartNumber {
        part: String,
    },
}

/// Product fields given on the command line.
#[derive(Args)]
pub struct ProductArgs {
    /// Product name
    #[arg(long)]
    name: String,

    /// X coordinate
    #[arg(long, allow_hyphen_values = true)]
    x: f64,

    /// Y coordinate
    #[arg(long, allow_hyphen_values = true)]
    y: i64,

    /// Price (greater than 0)
    #[arg(long)]
    price: f64,

    /// Part number
    #[arg(long)]
    part_number: String,

    /// Manufacture cost
    #[arg(long, allow_hyphen_values = true)]
    manufacture_cost: Option<f64>,

    /// Unit of measure (KILOGRAMS, METERS, CENTIMETERS, LITERS, GRAMS)
    #[arg(long, value_parser = parse_unit)]
    unit: Option<UnitOfMeasure>,
}

impl ProductArgs {
    pub fn into_new_product(self) -> NewProduct {
        NewProduct {
            name: self.name,
            coordinates: Coordinates {
                x: self.x,
                y: self.y,
            },
            price: self.price,
            part_number: self.part_number,
            manufacture_cost: self.manufacture_cost,
            unit_of_measure: self.unit,
        }
    }
}

fn default_server() -> String {
    format!(
        "{}:{}",
        prodstore_protocol::DEFAULT_HOST,
        prodstore_protocol::DEFAULT_PORT
    )
}

fn parse_unit(value: &str) -> Result<UnitOfMeasure, String> {
    UnitOfMeasure::parse(value).ok_or_else(|| format!("unknown unit of measure '{value}'"))
}

impl Cli {
    fn connection_config(&self, addr: SocketAddr) -> ConnectionConfig {
        ConnectionConfig::new(addr)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_retry_interval(Duration::from_millis(self.retry_interval_ms))
            .with_lost_threshold(Duration::from_millis(self.lost_threshold_ms))
            .with_transport(
                TransportConfig::default()
                    .with_framing(self.framing)
                    .with_packet_size(self.packet_size),
            )
    }
}

async fn resolve(server: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    tokio::net::lookup_host(server)
        .await?
        .next()
        .ok_or_else(|| format!("cannot resolve {server}").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let cli = Cli::parse();
    let addr = resolve(&cli.server).await?;
    tracing::debug!("Resolved {} to {}", cli.server, addr);
    let config = cli.connection_config(addr);
    config.transport.validate()?;

    match cli.command {
        Some(Commands::Repl) | None => run_repl(config).await,
        Some(cmd) => {
            let mut conn = Connection::open(config).await?;
            if let Commands::Ping = cmd {
                if conn.probe().await {
                    println!("{}", "PONG".green());
                    return Ok(());
                }
                eprintln!("{}: no reply from {}", "Error".red(), addr);
                std::process::exit(1);
            }

            let client = Client::new(conn);
            match commands::execute(&client, cmd).await {
                Ok(output) => {
                    println!("{}", output);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Runs the REPL under the reconnect loop until the user quits or presses
/// Ctrl+C while no session is active.
async fn run_repl(config: ConnectionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr;
    println!("{}", "prodstore CLI".bold().cyan());
    println!("Connecting to {}...", addr);

    let repl = Arc::new(tokio::sync::Mutex::new(repl::Repl::new()?));
    let reconnector = Arc::new(Reconnector::new(config));

    {
        let reconnector = reconnector.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                reconnector.shutdown();
            }
        });
    }

    reconnector
        .run(
            |client| {
                let repl = repl.clone();
                async move { repl.lock().await.session(client).await }
            },
            |event| match event {
                SessionEvent::Connected => {
                    println!("{} {}", "Connected to".green(), addr);
                    println!("Type 'help' for available commands.\n");
                }
                SessionEvent::ConnectionLost { down_for } => {
                    println!(
                        "{}: no reply from {} for {}s, still retrying...",
                        "Connection lost".red(),
                        addr,
                        down_for.as_secs()
                    );
                }
            },
        )
        .await;

    repl.lock().await.save_history();
    println!("{}", "Disconnected.".dimmed());
    Ok(())
}
