//! Collection command handlers.

use crate::error::ServerError;
use crate::registry::{CommandRegistry, Executable};
use prodstore_protocol::commands;
use prodstore_protocol::message::*;
use prodstore_protocol::NewProduct;
use prodstore_storage::ProductRepository;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

type HandlerFn = fn(&ProductRepository, &Value) -> Result<Value, ServerError>;

/// A command that operates on the product collection.
pub struct RepositoryCommand {
    repo: Arc<ProductRepository>,
    description: &'static str,
    handler: HandlerFn,
}

impl RepositoryCommand {
    pub fn new(repo: Arc<ProductRepository>, description: &'static str, handler: HandlerFn) -> Self {
        Self {
            repo,
            description,
            handler,
        }
    }
}

impl Executable for RepositoryCommand {
    fn apply(&self, request: &Request) -> Response {
        match (self.handler)(&self.repo, &request.args) {
            Ok(value) => Response::ok(value),
            Err(e) => {
                tracing::debug!("Command '{}' failed: {}", request.command, e);
                Response::error(e.to_response_error())
            }
        }
    }

    fn description(&self) -> &str {
        self.description
    }
}

/// Lists the commands registered before it.
pub struct HelpCommand {
    listing: Value,
}

impl HelpCommand {
    pub fn new(commands: Vec<CommandDescription>) -> Self {
        let listing = serde_json::to_value(HelpResult { commands }).unwrap_or(Value::Null);
        Self { listing }
    }
}

impl Executable for HelpCommand {
    fn apply(&self, _request: &Request) -> Response {
        Response::ok(self.listing.clone())
    }

    fn description(&self) -> &str {
        HELP_DESCRIPTION
    }
}

const HELP_DESCRIPTION: &str = "show the available commands";

/// Builds the registry with every collection command.
pub fn build_registry(repo: Arc<ProductRepository>) -> CommandRegistry {
    let table: [(&str, &'static str, HandlerFn); 12] = [
        (commands::INFO, "show collection type, init date and size", handle_info),
        (commands::SHOW, "list all products", handle_show),
        (commands::ADD, "add a new product", handle_add),
        (commands::UPDATE, "update the product with the given id", handle_update),
        (commands::REMOVE_BY_ID, "remove the product with the given id", handle_remove_by_id),
        (commands::CLEAR, "remove all products", handle_clear),
        (commands::HEAD, "show the first product", handle_head),
        (
            commands::ADD_IF_MAX,
            "add a product if its price exceeds every stored price",
            handle_add_if_max,
        ),
        (
            commands::ADD_IF_MIN,
            "add a product if its price is below every stored price",
            handle_add_if_min,
        ),
        (commands::SUM_OF_PRICE, "sum the prices of all products", handle_sum_of_price),
        (
            commands::FILTER_BY_PRICE,
            "list products with the given price",
            handle_filter_by_price,
        ),
        (
            commands::FILTER_CONTAINS_PART_NUMBER,
            "list products whose part number contains the given text",
            handle_filter_contains_part_number,
        ),
    ];

    let mut registry = CommandRegistry::new();
    for (name, description, handler) in table {
        registry.register(name, RepositoryCommand::new(repo.clone(), description, handler));
    }

    let mut listing = registry.describe();
    listing.push(CommandDescription {
        name: commands::HELP.to_string(),
        description: HELP_DESCRIPTION.to_string(),
    });
    listing.sort_by(|a, b| a.name.cmp(&b.name));
    registry.register(commands::HELP, HelpCommand::new(listing));

    tracing::debug!("Registered {} commands", registry.len());
    registry
}

fn params<T: DeserializeOwned>(args: &Value) -> Result<T, ServerError> {
    serde_json::from_value(args.clone()).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

fn product_list(products: Vec<prodstore_protocol::Product>) -> Result<Value, ServerError> {
    Ok(serde_json::to_value(ProductList { products })?)
}

fn handle_info(repo: &ProductRepository, _args: &Value) -> Result<Value, ServerError> {
    let result = InfoResult {
        collection_type: repo.collection_type().to_string(),
        init_date: repo.init_date(),
        size: repo.len(),
    };
    Ok(serde_json::to_value(result)?)
}

fn handle_show(repo: &ProductRepository, _args: &Value) -> Result<Value, ServerError> {
    product_list(repo.all_sorted())
}

fn handle_add(repo: &ProductRepository, args: &Value) -> Result<Value, ServerError> {
    let draft: NewProduct = params(args)?;
    let product = repo.add(draft)?;
    Ok(serde_json::to_value(product)?)
}

fn handle_update(repo: &ProductRepository, args: &Value) -> Result<Value, ServerError> {
    let p: UpdateParams = params(args)?;
    let product = repo.update(p.id, p.product)?;
    Ok(serde_json::to_value(product)?)
}

fn handle_remove_by_id(repo: &ProductRepository, args: &Value) -> Result<Value, ServerError> {
    let p: IdParams = params(args)?;
    let product = repo.remove(p.id)?;
    Ok(serde_json::to_value(product)?)
}

fn handle_clear(repo: &ProductRepository, _args: &Value) -> Result<Value, ServerError> {
    let removed = repo.clear();
    Ok(json!({ "removed": removed }))
}

fn handle_head(repo: &ProductRepository, _args: &Value) -> Result<Value, ServerError> {
    product_list(repo.first().into_iter().collect())
}

fn handle_add_if_max(repo: &ProductRepository, args: &Value) -> Result<Value, ServerError> {
    let draft: NewProduct = params(args)?;
    match repo.add_if_max(draft)? {
        Some(product) => Ok(serde_json::to_value(product)?),
        None => Err(ServerError::ConditionNotMet(
            "price does not exceed the maximum price".to_string(),
        )),
    }
}

fn handle_add_if_min(repo: &ProductRepository, args: &Value) -> Result<Value, ServerError> {
    let draft: NewProduct = params(args)?;
    match repo.add_if_min(draft)? {
        Some(product) => Ok(serde_json::to_value(product)?),
        None => Err(ServerError::ConditionNotMet(
            "price is not below the minimum price".to_string(),
        )),
    }
}

fn handle_sum_of_price(repo: &ProductRepository, _args: &Value) -> Result<Value, ServerError> {
    Ok(serde_json::to_value(SumResult {
        sum: repo.sum_of_price(),
    })?)
}

fn handle_filter_by_price(repo: &ProductRepository, args: &Value) -> Result<Value, ServerError> {
    let p: PriceParams = params(args)?;
    product_list(repo.filter_by_price(p.price))
}

fn handle_filter_contains_part_number(
    repo: &ProductRepository,
    args: &Value,
) -> Result<Value, ServerError> {
    let p: PartNumberParams = params(args)?;
    product_list(repo.filter_contains_part_number(&p.part))
}
