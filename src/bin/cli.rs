//! toolchat CLI
//!
//! Interactive chat, one-shot questions, tool listing and the HTTP gateway.

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use toolchat::config::{self, Config};
use toolchat::{build_client, ChatOrchestrator, McpSessionFactory, SchemaDialect, VERSION};

/// Inputs that end the chat loop
const EXIT_WORDS: [&str; 4] = ["e", "exit", "quit", "/quit"];

#[derive(Parser)]
#[command(
    name = "toolchat",
    version = VERSION,
    about = "Chat with a language model that can call one MCP tool per turn",
    long_about = None
)]
struct Cli {
    /// Config file (JSON5 or TOML)
    #[arg(long, global = true, env = "TOOLCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Function-calling dialect of the model endpoint (openai, gemini)
    #[arg(long, global = true)]
    dialect: Option<SchemaDialect>,

    /// Model identifier
    #[arg(long, short, global = true)]
    model: Option<String>,

    /// Tool server: SSE URL or stdio:<command>
    #[arg(long, global = true)]
    tool_endpoint: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TOOLCHAT_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Answer a single utterance and exit
    Ask {
        /// What to ask
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
    },

    /// List the tools the tool server offers
    Tools,

    /// Run the HTTP gateway
    Serve {
        /// Port to bind (overrides config)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Write a sample configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Some(Commands::InitConfig { force }) = cli.command {
        let path = cli.config.clone().unwrap_or_else(config::config_path);
        return init_config(&path, force);
    }

    let config = load(&cli)?;

    match cli.command {
        None | Some(Commands::Chat) => interactive_chat(&config).await,
        Some(Commands::Ask { utterance }) => ask(&config, &utterance.join(" ")).await,
        Some(Commands::Tools) => list_tools(&config).await,
        Some(Commands::Serve { port }) => {
            let mut gateway = config.gateway.clone();
            if let Some(port) = port {
                gateway.port = port;
            }
            let orchestrator = Arc::new(build_orchestrator(&config)?);
            toolchat::gateway::serve(&gateway, orchestrator).await?;
            Ok(())
        }
        Some(Commands::InitConfig { .. }) => Ok(()),
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "toolchat=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load config, apply command-line overrides and validate
fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = config::load_config_at(cli.config.as_deref())?;

    if let Some(dialect) = cli.dialect {
        config.model.dialect = dialect;
    }
    if let Some(ref model) = cli.model {
        config.model.model = Some(model.clone());
    }
    if let Some(ref endpoint) = cli.tool_endpoint {
        config.tools.endpoint = endpoint.clone();
    }

    let report = config::validate_config(&config);
    for issue in &report.warnings {
        warn!("{}", issue);
    }
    if !report.valid {
        let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    Ok(config)
}

fn build_orchestrator(config: &Config) -> anyhow::Result<ChatOrchestrator> {
    let model = build_client(&config.model)?;
    let sessions = Arc::new(McpSessionFactory::new(config.tools.timeout));

    Ok(ChatOrchestrator::new(model, sessions, config.tools.tool_endpoint()?)
        .with_system_prompt(config.model.system_prompt.clone())
        .with_options(toolchat::model::GenerationOptions {
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
        })
        .with_call_timeout(config.model.timeout))
}

async fn ask(config: &Config, utterance: &str) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let (reply, trace) = orchestrator.handle_with_trace(utterance).await?;

    if let Some(tool) = trace.tool_called {
        eprintln!("{} {}", style("tool:").dim(), style(tool).cyan());
    }
    println!("{}", reply);
    Ok(())
}

async fn list_tools(config: &Config) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let tools = orchestrator
        .list_tools()
        .await
        .with_context(|| format!("listing tools on {}", orchestrator.endpoint()))?;

    println!(
        "{} tools on {}",
        style(tools.len()).bold(),
        style(orchestrator.endpoint()).cyan()
    );
    for tool in tools {
        println!("  {}  {}", style(&tool.name).green().bold(), style(&tool.description).dim());
    }
    Ok(())
}

async fn interactive_chat(config: &Config) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let theme = ColorfulTheme::default();

    println!();
    println!(
        "   {} {} via {}",
        style("toolchat").cyan().bold(),
        style(config.model.model_name()).cyan(),
        style(orchestrator.endpoint()).dim()
    );
    println!("   {}", style("Type e, exit or /quit to leave").dim());
    println!();

    loop {
        let input: String = Input::with_theme(&theme)
            .with_prompt(style("You").green().bold().to_string())
            .allow_empty(true)
            .interact_text()
            .context("reading input")?;

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
            println!("\n{} Goodbye!\n", style("👋").bold());
            break;
        }

        let term = Term::stderr();
        term.write_line(&style("   thinking...").dim().to_string()).ok();
        let outcome = orchestrator.handle_with_trace(input).await;
        term.clear_last_lines(1).ok();

        // A failed turn is reported and the loop goes on
        match outcome {
            Ok((reply, trace)) => {
                if let Some(tool) = trace.tool_called {
                    println!("   {} {}", style("⚙ used").dim(), style(tool).cyan());
                }
                println!("{} {}\n", style("Assistant:").blue().bold(), reply);
            }
            Err(e) => println!("{} {}\n", style("✗").red(), e),
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }

    let mut sample = Config::default();
    sample.model.system_prompt = Some("Answer briefly.".to_string());
    config::save_config(&sample, path)?;

    println!("{} Wrote {}", style("✓").green(), style(path.display()).cyan());
    println!(
        "   {}",
        style("Set TOOLCHAT_API_KEY (or API_KEY) in the environment; keys are never saved").dim()
    );
    Ok(())
}
