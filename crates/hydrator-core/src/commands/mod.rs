//! Bang-command registry.
//!
//! The registry is the context provider for `!command` references. A key is
//! the raw command string without its leading `!` (e.g. `book "moby dick"`).
//! It is tokenized with shell-style quoting, the first token (lower-cased)
//! selects a handler, and the rest are passed as arguments.
//!
//! Every outcome is a rendered `command_result` snippet. Parse failures,
//! unknown commands and handler faults become error snippets; they never
//! abort hydration.

pub mod books;

pub use books::{BookDetailCommand, BookLibrary, ListBooksCommand, normalize_title};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::BoxFuture;
use crate::provider::{ContextProvider, ProviderError};
use crate::snippet::{CommandResult, ContextSnippet};

/// `source` of results produced by the registry itself.
pub const REGISTRY_SOURCE: &str = "CommandRegistry";

/// Errors from parsing or running a bang command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("could not parse command: {0}")]
    Parse(String),

    #[error("{0}")]
    Failed(String),
}

/// A bang-command handler.
pub trait CommandHandler: Send + Sync {
    /// Run the command with its (already tokenized) arguments.
    fn run<'a>(&'a self, args: &'a [String]) -> BoxFuture<'a, Result<CommandResult, CommandError>>;
}

/// Split a command string into its lower-cased name and arguments.
///
/// Quoting follows POSIX shell rules: `book "moby dick"` yields
/// `("book", ["moby dick"])`.
pub fn parse_command(query: &str) -> Result<(String, Vec<String>), CommandError> {
    let mut tokens = shlex::split(query)
        .ok_or_else(|| CommandError::Parse(format!("unbalanced quoting in '{query}'")))?
        .into_iter();
    let name = tokens
        .next()
        .ok_or_else(|| CommandError::Parse("empty command".to_string()))?;
    Ok((name.to_lowercase(), tokens.collect()))
}

/// `!testcmd`: echoes its arguments.
pub struct TestCommand;

impl CommandHandler for TestCommand {
    fn run<'a>(&'a self, args: &'a [String]) -> BoxFuture<'a, Result<CommandResult, CommandError>> {
        Box::pin(async move {
            info!(args = ?args, "Running !testcmd");
            Ok(CommandResult::new(
                format!("!testcmd {}", args.join(" ")).trim_end(),
                format!("Test command executed successfully with args: {args:?}"),
                "TestCommandHandler",
            ))
        })
    }
}

/// Maps command names to handlers.
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with the built-in commands: `testcmd`, `books`, `book`
    /// and its alias `b`.
    pub fn with_defaults(library: Arc<BookLibrary>) -> Self {
        let mut registry = Self::new();
        registry.register("testcmd", Arc::new(TestCommand));
        registry.register("books", Arc::new(ListBooksCommand::new(library.clone())));
        let detail: Arc<dyn CommandHandler> = Arc::new(BookDetailCommand::new(library));
        registry.register("book", detail.clone());
        registry.register("b", detail);
        registry
    }

    /// Register `handler` under `name`. An existing handler with the same
    /// name is replaced.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) {
        let name = name.to_lowercase();
        if self.handlers.contains_key(&name) {
            warn!(command = %name, "Command already registered, overwriting");
        }
        info!(command = %name, "Registered bang command");
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parse and run one command string, converting every failure into an
    /// error result.
    pub async fn execute(&self, query: &str) -> CommandResult {
        let (name, args) = match parse_command(query) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(query, error = %e, "Could not parse bang command");
                return CommandResult::new(
                    format!("!{query}"),
                    "Error: Could not parse command.",
                    REGISTRY_SOURCE,
                );
            }
        };
        let echoed = format!("!{name} {}", args.join(" ")).trim_end().to_string();

        let Some(handler) = self.get(&name) else {
            warn!(command = %name, "No handler for bang command");
            return CommandResult::new(
                echoed,
                format!("Error: Command '!{name}' not found."),
                REGISTRY_SOURCE,
            );
        };

        match handler.run(&args).await {
            Ok(result) => result,
            Err(e) => {
                error!(command = %name, args = ?args, error = %e, "Bang command failed");
                CommandResult::new(
                    echoed,
                    format!("Error executing command '{name}': {e}"),
                    REGISTRY_SOURCE,
                )
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for CommandRegistry {
    fn name(&self) -> &str {
        "CommandRegistry"
    }

    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            info!(query = %key, "Resolving bang command");
            let result = self.execute(key).await;
            Ok(vec![ContextSnippet::CommandResult(result).to_markup()?])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Broken;

    impl CommandHandler for Broken {
        fn run<'a>(
            &'a self,
            _args: &'a [String],
        ) -> BoxFuture<'a, Result<CommandResult, CommandError>> {
            Box::pin(async { Err(CommandError::Failed("disk on fire".to_string())) })
        }
    }

    struct Fixed(&'static str);

    impl CommandHandler for Fixed {
        fn run<'a>(
            &'a self,
            _args: &'a [String],
        ) -> BoxFuture<'a, Result<CommandResult, CommandError>> {
            Box::pin(async move { Ok(CommandResult::new("!fixed", self.0, "Fixed")) })
        }
    }

    fn registry() -> CommandRegistry {
        CommandRegistry::with_defaults(Arc::new(BookLibrary::default()))
    }

    #[test]
    fn test_parse_command() {
        let (name, args) = parse_command(r#"Book "The Great Gatsby" now"#).unwrap();
        assert_eq!(name, "book");
        assert_eq!(args, vec!["The Great Gatsby".to_string(), "now".to_string()]);
    }

    #[test]
    fn test_parse_command_failures() {
        assert!(matches!(parse_command(""), Err(CommandError::Parse(_))));
        assert!(matches!(parse_command("   "), Err(CommandError::Parse(_))));
        assert!(matches!(
            parse_command(r#"book "unterminated"#),
            Err(CommandError::Parse(_))
        ));
    }

    #[test]
    fn test_default_names() {
        assert_eq!(registry().names(), vec!["b", "book", "books", "testcmd"]);
    }

    #[tokio::test]
    async fn test_testcmd_echoes_args() {
        let result = registry()
            .execute(r#"testcmd arg1 "argument with spaces""#)
            .await;
        assert_eq!(result.command_query, "!testcmd arg1 argument with spaces");
        assert_eq!(
            result.result_text,
            r#"Test command executed successfully with args: ["arg1", "argument with spaces"]"#
        );
        assert_eq!(result.source, "TestCommandHandler");
    }

    #[tokio::test]
    async fn test_testcmd_without_args() {
        let result = registry().execute("testcmd").await;
        assert_eq!(result.command_query, "!testcmd");
        assert_eq!(
            result.result_text,
            "Test command executed successfully with args: []"
        );
    }

    #[tokio::test]
    async fn test_command_name_is_case_insensitive() {
        let result = registry().execute("TESTCMD x").await;
        assert_eq!(result.source, "TestCommandHandler");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let result = registry().execute("unknowncmd arg1").await;
        assert_eq!(result.command_query, "!unknowncmd arg1");
        assert_eq!(result.result_text, "Error: Command '!unknowncmd' not found.");
        assert_eq!(result.source, "CommandRegistry");
    }

    #[tokio::test]
    async fn test_parse_error_snippet() {
        let result = registry().execute(r#"book "moby"#).await;
        assert_eq!(result.command_query, r#"!book "moby"#);
        assert_eq!(result.result_text, "Error: Could not parse command.");
    }

    #[tokio::test]
    async fn test_handler_fault_becomes_snippet() {
        let mut registry = CommandRegistry::new();
        registry.register("explode", Arc::new(Broken));
        let result = registry.execute("explode now please").await;
        assert_eq!(result.command_query, "!explode now please");
        assert_eq!(
            result.result_text,
            "Error executing command 'explode': disk on fire"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_register_overwrites() {
        let mut registry = CommandRegistry::new();
        registry.register("dup", Arc::new(Fixed("first")));
        registry.register("DUP", Arc::new(Fixed("second")));
        assert_eq!(registry.names(), vec!["dup"]);
        assert_eq!(registry.execute("dup").await.result_text, "second");
    }

    #[tokio::test]
    async fn test_book_alias() {
        let registry = registry();
        let via_b = registry.execute("b").await;
        let via_book = registry.execute("book").await;
        assert_eq!(via_b, via_book);
        assert!(via_b.result_text.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn test_get_context_renders_markup() {
        let snippets = registry().get_context("books").await.unwrap();
        assert_eq!(
            snippets,
            vec![
                "<context-snippet type=\"command_result\">\n\
                 \x20 <command-query>!books</command-query>\n\
                 \x20 <result-text>No books available. Please check the configuration for BOOKS_DIR_PATH.</result-text>\n\
                 \x20 <source>LocalBookDirectory</source>\n\
                 </context-snippet>"
                    .to_string()
            ]
        );
    }
}
