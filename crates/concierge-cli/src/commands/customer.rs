//! /customer and /register commands - customer directory access

use super::CommandResult;
use concierge_agent::{CustomerDirectory, CustomerLookup, lookup};
use tracing::warn;

pub struct CustomerCommand;

impl CustomerCommand {
    pub async fn execute(args: &str, directory: &dyn CustomerDirectory) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /customer <name>".to_string());
        }

        CommandResult::Message(match lookup(directory, args).await {
            CustomerLookup::Found(record) => record.to_string(),
            CustomerLookup::NotFound => format!("No customer found matching \"{}\".", args),
            CustomerLookup::Unknown => {
                "Customer lookup is unavailable right now. Please try again later.".to_string()
            }
        })
    }
}

pub struct RegisterCommand;

impl RegisterCommand {
    pub async fn execute(args: &str, directory: &dyn CustomerDirectory) -> CommandResult {
        let Some((name, email)) = parse_registration(args) else {
            return CommandResult::Message(
                "Usage: /register <name> <email>\nExample: /register Jane Doe jane@example.com"
                    .to_string(),
            );
        };

        CommandResult::Message(match directory.register(&name, &email).await {
            Ok(record) => format!(
                "Registered new customer: {} ({})",
                record.name, record.email
            ),
            Err(e) => {
                warn!(backend = directory.name(), "customer registration failed: {}", e);
                "Could not register the customer right now. Please try again later.".to_string()
            }
        })
    }
}

/// Split "<name...> <email>": the last word is the email, the rest the name.
fn parse_registration(args: &str) -> Option<(String, String)> {
    let (name, email) = args.trim().rsplit_once(char::is_whitespace)?;
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() || !email.contains('@') {
        return None;
    }
    Some((name, email.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_agent::{DisconnectedDirectory, InMemoryDirectory};

    fn message(result: CommandResult) -> String {
        match result {
            CommandResult::Message(m) => m,
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_registration() {
        assert_eq!(
            parse_registration("Jane   Doe jane@example.com"),
            Some(("Jane Doe".into(), "jane@example.com".into()))
        );
        assert_eq!(parse_registration("jane@example.com"), None);
        assert_eq!(parse_registration("Jane Doe"), None);
        assert_eq!(parse_registration(""), None);
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let directory = InMemoryDirectory::new();
        let out = message(CustomerCommand::execute("nobody", &directory).await);
        assert_eq!(out, "No customer found matching \"nobody\".");
    }

    #[tokio::test]
    async fn test_lookup_requires_a_name() {
        let directory = InMemoryDirectory::new();
        let out = message(CustomerCommand::execute("", &directory).await);
        assert!(out.starts_with("Usage"));
    }

    #[tokio::test]
    async fn test_unavailable_directory_degrades_to_message() {
        let directory = DisconnectedDirectory::new("connection refused");
        let out = message(CustomerCommand::execute("john", &directory).await);
        assert!(out.contains("unavailable"));

        let out = message(RegisterCommand::execute("John j@example.com", &directory).await);
        assert!(out.starts_with("Could not register"));
    }

    #[tokio::test]
    async fn test_bad_registration_is_not_stored() {
        let directory = InMemoryDirectory::new();
        let out = message(RegisterCommand::execute("John", &directory).await);
        assert!(out.starts_with("Usage"));
        assert!(directory.is_empty().await);
    }
}
