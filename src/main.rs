use anyhow::{Context, Result};
use clap::Parser;
use memclient::config::{EnvSource, ProcessEnv};
use memclient::models::{ChatRequest, IngestRequest, MemoryQuery};
use memclient::{ClientConfig, ErrorKind, MemoryClient};
use serde::Serialize;

/// memclient - talk to a memory-assistant server
///
/// Credentials can also be provided through MEMCLIENT_API_KEY or MEMCLIENT_TOKEN.
///
/// Examples:
///   memclient chat "what do I drink in the morning?"
///   memclient ingest "I drink green tea every morning"
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(
        long = "base-url",
        env = "MEMCLIENT_BASE_URL",
        value_name = "URL",
        global = true
    )]
    base_url: Option<String>,

    /// API key sent as a bearer credential
    #[arg(
        long = "api-key",
        env = "MEMCLIENT_API_KEY",
        global = true,
        hide_env_values = true
    )]
    api_key: Option<String>,

    /// Bearer token, used when no API key is given
    #[arg(
        long = "token",
        env = "MEMCLIENT_TOKEN",
        global = true,
        hide_env_values = true
    )]
    token: Option<String>,

    /// Development identity header
    #[arg(long = "user-id", env = "MEMCLIENT_USER_ID", global = true)]
    user_id: Option<String>,

    /// Retries for transient failures
    #[arg(long = "max-retries", value_name = "N", global = true)]
    max_retries: Option<u32>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check that the server is up
    Health,

    /// Check that the server and its stores are ready
    Ready,

    /// Ask a question answered from stored memories
    Chat(ChatArgs),

    /// Store a piece of text as memories
    Ingest(IngestArgs),

    /// List stored memories
    Memories(MemoriesArgs),
}

#[derive(clap::Args, Debug)]
struct ChatArgs {
    question: String,

    /// Scope the answer to a session
    #[arg(long)]
    session: Option<String>,

    /// Answer language, e.g. "en"
    #[arg(long)]
    language: Option<String>,
}

#[derive(clap::Args, Debug)]
struct IngestArgs {
    text: String,

    #[arg(long = "source-id")]
    source_id: Option<String>,

    #[arg(long)]
    session: Option<String>,
}

#[derive(clap::Args, Debug)]
struct MemoriesArgs {
    #[arg(long, default_value_t = 50)]
    limit: u32,

    #[arg(long)]
    kind: Option<String>,

    #[arg(long)]
    search: Option<String>,
}

/// Flags given as empty strings are treated as absent.
fn flag(value: &Option<String>) -> Option<String> {
    value.clone().filter(|value| !value.trim().is_empty())
}

impl Cli {
    /// Starts from the environment and applies the flags that were given.
    fn config(&self, env: &impl EnvSource) -> memclient::Result<ClientConfig> {
        let mut config = ClientConfig::from_env(env)?;
        if let Some(base_url) = flag(&self.base_url) {
            config.base_url = base_url;
        }
        if let Some(api_key) = flag(&self.api_key) {
            config.api_key = Some(api_key);
        }
        if let Some(token) = flag(&self.token) {
            config.bearer_token = Some(token);
        }
        if let Some(user_id) = flag(&self.user_id) {
            config.user_id = Some(user_id);
        }
        if let Some(max_retries) = self.max_retries {
            config = config.with_max_retries(max_retries);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = cli
        .config(&ProcessEnv)
        .context("Invalid client configuration")?;
    let client = MemoryClient::new(config).context("Invalid client configuration")?;
    let result = run(&client, cli.command).await;
    client.close();

    if let Err(err) = &result {
        if let Some(hint) = hint_for(err.kind()) {
            eprintln!("hint: {}", hint);
        }
    }
    result.map_err(anyhow::Error::from)
}

async fn run(client: &MemoryClient, command: Commands) -> memclient::Result<()> {
    match command {
        Commands::Health => print_json(&client.health().await?),
        Commands::Ready => print_json(&client.ready().await?),
        Commands::Chat(args) => {
            let mut request = ChatRequest::new(args.question);
            request.session_id = args.session;
            request.language = args.language;
            print_json(&client.chat(&request).await?)
        }
        Commands::Ingest(args) => {
            let mut request = IngestRequest::new(args.text);
            request.source_id = args.source_id;
            request.session_id = args.session;
            print_json(&client.ingest_chat(&request).await?)
        }
        Commands::Memories(args) => {
            let query = MemoryQuery {
                limit: args.limit,
                kind: args.kind,
                search: args.search,
                ..MemoryQuery::default()
            };
            print_json(&client.list_memories(&query).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> memclient::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn hint_for(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::Authentication => {
            Some("check your credentials (--api-key, --token, MEMCLIENT_API_KEY or MEMCLIENT_TOKEN)")
        }
        ErrorKind::Authorization => Some("your credentials do not grant access to this resource"),
        ErrorKind::RateLimit => Some("the server is rate limiting requests, try again later"),
        ErrorKind::Connection => Some("could not reach the server, check --base-url"),
        ErrorKind::Timeout => Some("the server took too long to answer"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    #[derive(Default)]
    struct FakeEnv(HashMap<&'static str, &'static str>);

    impl FakeEnv {
        fn with(mut self, key: &'static str, value: &'static str) -> Self {
            self.0.insert(key, value);
            self
        }
    }

    impl EnvSource for FakeEnv {
        fn var(&self, key: &str) -> std::result::Result<String, VarError> {
            self.0
                .get(key)
                .map(|value| value.to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("memclient").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_chat_parsing() {
        let cli = parse(&["chat", "hello", "--session", "s1", "--language", "de"]);
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.question, "hello");
                assert_eq!(args.session.as_deref(), Some("s1"));
                assert_eq!(args.language.as_deref(), Some("de"));
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = parse(&[
            "--base-url",
            "http://localhost:8000",
            "health",
            "--max-retries",
            "0",
            "--api-key",
            "key",
        ]);

        let config = cli.config(&FakeEnv::default()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_config_keeps_environment_when_flags_absent() {
        let env = FakeEnv::default()
            .with("MEMCLIENT_TOKEN", "tok")
            .with("MEMCLIENT_MAX_RETRIES", "7");
        let cli = Cli {
            command: Commands::Health,
            base_url: None,
            api_key: None,
            token: None,
            user_id: None,
            max_retries: None,
        };

        let config = cli.config(&env).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.bearer_token.as_deref(), Some("tok"));
        assert_eq!(config.retry.max_retries, 7);
    }

    #[test]
    fn test_config_ignores_empty_flags() {
        let env = FakeEnv::default().with("MEMCLIENT_API_KEY", "sk-env");
        let cli = Cli {
            command: Commands::Health,
            base_url: Some(String::new()),
            api_key: Some(String::new()),
            token: None,
            user_id: None,
            max_retries: None,
        };

        let config = cli.config(&env).unwrap();
        assert_eq!(config.base_url, memclient::config::DEFAULT_BASE_URL);
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn test_cli_memories_defaults() {
        let cli = parse(&["memories", "--kind", "preference"]);
        match cli.command {
            Commands::Memories(args) => {
                assert_eq!(args.limit, 50);
                assert_eq!(args.kind.as_deref(), Some("preference"));
                assert_eq!(args.search, None);
            }
            _ => panic!("Expected Memories command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["memclient"]).is_err());
    }

    #[test]
    fn test_hints() {
        assert!(hint_for(ErrorKind::Authentication).unwrap().contains("credentials"));
        assert!(hint_for(ErrorKind::NotFound).is_none());
    }
}
