//! Command dispatch registry.
//!
//! Maps command names to handlers. The registry is built once at startup and
//! shared read-only between request tasks, so it needs no locking.

use prodstore_protocol::message::CommandDescription;
use prodstore_protocol::{Request, Response};
use std::collections::HashMap;

/// A command handler.
pub trait Executable: Send + Sync {
    /// Executes the command. Failures are reported as error responses.
    fn apply(&self, request: &Request) -> Response;

    /// One-line description shown by `help`.
    fn description(&self) -> &str;
}

/// Name-to-handler lookup table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Executable>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `handler`. A later registration for the same name wins.
    pub fn register(&mut self, name: impl Into<String>, handler: impl Executable + 'static) {
        let name = name.into();
        if self.commands.insert(name.clone(), Box::new(handler)).is_some() {
            tracing::warn!("Command '{}' registered twice, keeping the latest handler", name);
        }
    }

    /// Routes `request` to its handler.
    ///
    /// An unknown command name yields an `UNKNOWN_COMMAND` response. The
    /// handler's response is returned verbatim.
    pub fn dispatch(&self, request: &Request) -> Response {
        match self.commands.get(&request.command) {
            Some(handler) => {
                tracing::debug!("Dispatching '{}'", request.command);
                handler.apply(request)
            }
            None => {
                tracing::debug!("Unknown command '{}'", request.command);
                Response::unknown_command(&request.command)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns every registered command with its description, sorted by name.
    pub fn describe(&self) -> Vec<CommandDescription> {
        let mut listing: Vec<CommandDescription> = self
            .commands
            .iter()
            .map(|(name, handler)| CommandDescription {
                name: name.clone(),
                description: handler.description().to_string(),
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        listing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodstore_protocol::{ErrorCode, ResponseError};
    use serde_json::json;

    struct Echo;

    impl Executable for Echo {
        fn apply(&self, request: &Request) -> Response {
            Response::ok(request.args.clone())
        }

        fn description(&self) -> &str {
            "echo arguments"
        }
    }

    struct Failing;

    impl Executable for Failing {
        fn apply(&self, _request: &Request) -> Response {
            Response::error(ResponseError::new(ErrorCode::NotFound, "nothing here"))
        }

        fn description(&self) -> &str {
            "always fails"
        }
    }

    #[test]
    fn test_dispatch_registered() {
        let mut registry = CommandRegistry::new();
        registry.register("echo", Echo);

        let response = registry.dispatch(&Request::new("echo").with_args(json!({"a": 1})));
        assert!(response.is_ok());
        assert_eq!(response.result.unwrap()["a"], 1);
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let registry = CommandRegistry::new();
        let response = registry.dispatch(&Request::new("NOPE"));

        assert!(response.is_error());
        assert_eq!(response.error_code(), Some(ErrorCode::UnknownCommand));
    }

    #[test]
    fn test_handler_error_returned_verbatim() {
        let mut registry = CommandRegistry::new();
        registry.register("fail", Failing);

        let response = registry.dispatch(&Request::new("fail"));
        assert_eq!(
            response,
            Response::error(ResponseError::new(ErrorCode::NotFound, "nothing here"))
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = CommandRegistry::new();
        registry.register("cmd", Failing);
        registry.register("cmd", Echo);

        assert_eq!(registry.len(), 1);
        assert!(registry.dispatch(&Request::new("cmd")).is_ok());
    }

    #[test]
    fn test_describe_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register("zeta", Echo);
        registry.register("alpha", Failing);

        let names: Vec<String> = registry.describe().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(registry.contains("zeta"));
        assert!(!registry.contains("beta"));
    }
}
