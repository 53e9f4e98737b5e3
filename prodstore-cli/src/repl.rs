//! Interactive REPL.

use crate::commands;
use crate::form;
use colored::Colorize;
use prodstore_client::{Client, ClientError, SessionExit};
use prodstore_protocol::NewProduct;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::PathBuf;

const HELP_TEXT: &str = r#"
Available commands:
  help                              Show this help
  server-help                       List the commands the server supports
  info                              Show collection type, init date and size
  show                              List all products
  add [json]                        Add a product (prompts when no JSON is given)
  update <id> [json]                Replace the fields of a product
  remove_by_id <id>                 Remove a product
  clear                             Remove all products
  head                              Show the first product
  add_if_max [json]                 Add a product if its price is the highest
  add_if_min [json]                 Add a product if its price is the lowest
  sum_of_price                      Sum the prices of all products
  filter_by_price <price>           List products with the given price
  filter_contains_part_number <s>   List products whose part number contains <s>

  quit, exit                        Exit the REPL
"#;

/// Outcome of one REPL line.
enum Outcome {
    Output(String),
    Quit,
}

type LineResult = Result<Outcome, Box<dyn std::error::Error>>;

/// Line editor with history, kept across reconnects.
pub struct Repl {
    editor: Editor<(), DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    pub fn new() -> Result<Self, ReadlineError> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();
        let mut editor: Editor<(), DefaultHistory> = Editor::with_config(config)?;

        let history_path = home::home_dir()
            .map(|h| h.join(".prodstore_history"))
            .unwrap_or_else(|| ".prodstore_history".into());
        let _ = editor.load_history(&history_path);

        Ok(Self {
            editor,
            history_path,
        })
    }

    pub fn save_history(&mut self) {
        let _ = self.editor.save_history(&self.history_path);
    }

    /// Reads and executes lines until the user quits or the server stops
    /// answering.
    pub async fn session(&mut self, client: Client) -> SessionExit {
        loop {
            let prompt = format!("{} ", "prodstore>".cyan());
            let line = match self.editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("^D");
                    return SessionExit::Quit;
                }
                Err(err) => {
                    println!("{}: {:?}", "Error".red(), err);
                    return SessionExit::Quit;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.execute_line(&client, line).await {
                Ok(Outcome::Output(output)) => println!("{}\n", output),
                Ok(Outcome::Quit) => {
                    client.close().await;
                    return SessionExit::Quit;
                }
                Err(e) => {
                    let lost = e
                        .downcast_ref::<ClientError>()
                        .is_some_and(ClientError::is_connection_error);
                    println!("{}: {}\n", "Error".red(), e);
                    if lost {
                        println!("{}", "Server is not responding, reconnecting...".yellow());
                        client.close().await;
                        return SessionExit::Lost;
                    }
                }
            }
        }
    }

    async fn execute_line(&mut self, client: &Client, line: &str) -> LineResult {
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        let output = match cmd.to_lowercase().as_str() {
            "help" | "?" => HELP_TEXT.to_string(),
            "quit" | "exit" | "q" => return Ok(Outcome::Quit),

            "server-help" => commands::format_help(&client.help().await?),
            "info" => commands::format_info(&client.info().await?),
            "show" => commands::format_products(&client.show().await?),
            "head" => match client.head().await? {
                Some(product) => commands::format_product(&product),
                None => "Collection is empty".yellow().to_string(),
            },
            "clear" => format!("{} {} product(s)", "Removed".green(), client.clear().await?),
            "sum_of_price" => format!("Sum of prices: {}", client.sum_of_price().await?),

            "add" => match self.product_arg(rest)? {
                Some(draft) => commands::format_added(&client.add(draft).await?),
                None => "Cancelled".dimmed().to_string(),
            },
            "add_if_max" => match self.product_arg(rest)? {
                Some(draft) => commands::format_added(&client.add_if_max(draft).await?),
                None => "Cancelled".dimmed().to_string(),
            },
            "add_if_min" => match self.product_arg(rest)? {
                Some(draft) => commands::format_added(&client.add_if_min(draft).await?),
                None => "Cancelled".dimmed().to_string(),
            },

            "update" => {
                let (id, json) = match rest.split_once(char::is_whitespace) {
                    Some((id, json)) => (id, json.trim()),
                    None => (rest, ""),
                };
                if id.is_empty() {
                    return Ok(Outcome::Output("Usage: update <id> [json]".to_string()));
                }
                let id: u64 = id.parse()?;
                match self.product_arg(json)? {
                    Some(draft) => {
                        let product = client.update(id, draft).await?;
                        format!("{} {}", "Updated".green(), commands::format_product(&product))
                    }
                    None => "Cancelled".dimmed().to_string(),
                }
            }

            "remove_by_id" => {
                if rest.is_empty() {
                    return Ok(Outcome::Output("Usage: remove_by_id <id>".to_string()));
                }
                let product = client.remove_by_id(rest.parse()?).await?;
                format!("{} {}", "Removed".green(), commands::format_product(&product))
            }

            "filter_by_price" => {
                if rest.is_empty() {
                    return Ok(Outcome::Output("Usage: filter_by_price <price>".to_string()));
                }
                commands::format_products(&client.filter_by_price(rest.parse()?).await?)
            }

            "filter_contains_part_number" => {
                if rest.is_empty() {
                    return Ok(Outcome::Output(
                        "Usage: filter_contains_part_number <text>".to_string(),
                    ));
                }
                commands::format_products(&client.filter_contains_part_number(rest).await?)
            }

            _ => format!("Unknown command: {}. Type 'help' for help.", cmd),
        };

        Ok(Outcome::Output(output))
    }

    /// Parses inline JSON, or prompts for each field when none is given.
    fn product_arg(&mut self, json: &str) -> Result<Option<NewProduct>, Box<dyn std::error::Error>> {
        if json.is_empty() {
            return Ok(form::read_product(&mut self.editor)?);
        }
        let draft: NewProduct = serde_json::from_str(json)?;
        draft.validate()?;
        Ok(Some(draft))
    }
}
