//! Command execution and output formatting.

use crate::Commands;
use colored::Colorize;
use prodstore_client::Client;
use prodstore_protocol::message::{CommandDescription, InfoResult};
use prodstore_protocol::Product;

/// Executes a one-shot command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    let output = match cmd {
        Commands::Repl | Commands::Ping => unreachable!("handled by main"),

        Commands::Help => format_help(&client.help().await?),
        Commands::Info => format_info(&client.info().await?),
        Commands::Show => format_products(&client.show().await?),

        Commands::Add(args) => format_added(&client.add(args.into_new_product()).await?),
        Commands::AddIfMax(args) => {
            format_added(&client.add_if_max(args.into_new_product()).await?)
        }
        Commands::AddIfMin(args) => {
            format_added(&client.add_if_min(args.into_new_product()).await?)
        }

        Commands::Update { id, product } => {
            let product = client.update(id, product.into_new_product()).await?;
            format!("{} {}", "Updated".green(), format_product(&product))
        }

        Commands::RemoveById { id } => {
            let product = client.remove_by_id(id).await?;
            format!("{} {}", "Removed".green(), format_product(&product))
        }

        Commands::Clear => {
            let removed = client.clear().await?;
            format!("{} {} product(s)", "Removed".green(), removed)
        }

        Commands::Head => match client.head().await? {
            Some(product) => format_product(&product),
            None => "Collection is empty".yellow().to_string(),
        },

        Commands::SumOfPrice => format!("Sum of prices: {}", client.sum_of_price().await?),

        Commands::FilterByPrice { price } => {
            format_products(&client.filter_by_price(price).await?)
        }

        Commands::FilterContainsPartNumber { part } => {
            format_products(&client.filter_contains_part_number(&part).await?)
        }
    };
    Ok(output)
}

pub fn format_product(product: &Product) -> String {
    let mut out = format!(
        "{} {} [{}] price={} at ({}, {})",
        format!("#{}", product.id).cyan(),
        product.name.bold(),
        product.part_number,
        product.price.to_string().yellow(),
        product.coordinates.x,
        product.coordinates.y
    );
    if let Some(cost) = product.manufacture_cost {
        out.push_str(&format!(" cost={cost}"));
    }
    if let Some(unit) = product.unit_of_measure {
        out.push_str(&format!(" unit={unit}"));
    }
    out.push_str(&format!(
        " {}",
        product
            .creation_date
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    ));
    out
}

pub fn format_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products".yellow().to_string();
    }
    products
        .iter()
        .map(|p| format!("  {}", format_product(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_added(product: &Product) -> String {
    format!("{} {}", "Added".green(), format_product(product))
}

pub fn format_info(info: &InfoResult) -> String {
    format!(
        "{} {}\n{} {}\n{} {}",
        "Collection type:".bold(),
        info.collection_type,
        "Initialized:    ".bold(),
        info.init_date.format("%Y-%m-%d %H:%M:%S UTC"),
        "Size:           ".bold(),
        info.size
    )
}

pub fn format_help(commands: &[CommandDescription]) -> String {
    let width = commands.iter().map(|c| c.name.len()).max().unwrap_or(0);
    commands
        .iter()
        .map(|c| format!("  {}  {}", format!("{:width$}", c.name).cyan(), c.description))
        .collect::<Vec<_>>()
        .join("\n")
}
