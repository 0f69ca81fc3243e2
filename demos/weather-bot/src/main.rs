//! Weather assistant demonstrating `#[tool]` registration and the bounded
//! tool-calling loop.
//!
//! Set `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`, `OPENAI_MODEL`) then
//! run `cargo run -p weather-bot -- "What's the weather in Oslo?"`.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use openai_toolchain::adapters::openai::OpenAiAdapter;
use openai_toolchain::client::{ClientError, ToolClient};
use openai_toolchain::config::{ConfigError, ToolchainConfig};
use openai_toolchain::primitives::ChatMessage;
use openai_toolchain::tools::{ToolRegistry, tool};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PROMPT: &str = "What's the weather in Toronto and what's the forecast for tomorrow?";

/// Get the current weather in a given location.
#[tool(crate = "openai_toolchain::tools")]
fn get_weather(location: String, #[param(default = "celsius")] unit: String) -> String {
    format!("The weather in {location} is 22 {unit}")
}

/// Get a weather forecast for a location.
#[tool(crate = "openai_toolchain::tools")]
fn get_forecast(location: String, #[param(default = 1)] days: u32) -> String {
    format!("{days}-day forecast for {location}: Sunny")
}

#[derive(Debug, Parser)]
#[command(about = "Ask a model about the weather using local tools")]
struct Args {
    /// Model to use instead of `OPENAI_MODEL`.
    #[arg(long)]
    model: Option<String>,

    /// Maximum number of model requests per conversation.
    #[arg(long)]
    max_tool_calls: Option<usize>,

    /// Print the registered tools and exit.
    #[arg(long)]
    list_tools: bool,

    /// Question for the assistant.
    #[arg(default_value = DEFAULT_PROMPT)]
    prompt: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let registry = Arc::new(ToolRegistry::collected());

    println!("Available tools:");
    for line in tool_listing(&registry) {
        println!("- {line}");
    }
    if args.list_tools {
        return Ok(());
    }

    let mut config = match ToolchainConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::MissingApiKey { var }) => {
            eprintln!("Error: {var} environment variable not set");
            eprintln!("Please set your OpenAI API key and try again");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(max_tool_calls) = args.max_tool_calls {
        config = config.with_max_tool_calls(max_tool_calls);
    }

    let adapter = Arc::new(OpenAiAdapter::new(config.adapter_config()?)?);
    let client = ToolClient::new(adapter, registry);

    println!("\nUser: {}", args.prompt);
    info!(
        model = config.model(),
        max_tool_calls = config.max_tool_calls(),
        "starting conversation"
    );

    match client
        .run_conversation(
            vec![ChatMessage::user(args.prompt)],
            config.max_tool_calls(),
            None,
        )
        .await
    {
        Ok(outcome) => {
            for call in &outcome.tool_calls {
                println!("Tool {} -> {}", call.name, call.content);
            }
            println!("Assistant: {}", outcome.response);
        }
        Err(ClientError::RoundBudgetExceeded {
            max_rounds,
            last_response,
        }) => {
            println!("Gave up after {max_rounds} model requests.");
            if let Some(text) = last_response {
                println!("Last reply: {text}");
            }
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}

fn tool_listing(registry: &ToolRegistry) -> Vec<String> {
    registry
        .get_tool_schemas()
        .iter()
        .map(|schema| {
            let function = schema.function_schema();
            format!("{}: {}", function.name(), function.description())
        })
        .collect()
}
