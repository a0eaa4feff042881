use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tshover_core::config::LoadedConfig;
use tshover_engine::{EngineOptions, HoverEngine};
use tshover_lsp::TsLspClient;

#[derive(Debug, Parser)]
#[command(name = "tshover")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, ClapArgs)]
struct ConfigArgs {
    /// Optional path to a `tshover` config file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override workspace root (defaults to config or current directory)
    #[arg(long)]
    workspace_root: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run MCP server over stdio
    Mcp {
        #[command(flatten)]
        config: ConfigArgs,
        /// Start the language server eagerly (reduces first-tool-call latency)
        #[arg(long)]
        warmup: bool,
    },
    /// Print resolved configuration and check that the language server runs
    Doctor {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the hover text at a 0-based position
    Hover {
        #[command(flatten)]
        config: ConfigArgs,
        file: PathBuf,
        line: u32,
        character: u32,
    },
    /// Print the hover text for a named symbol
    Symbol {
        #[command(flatten)]
        config: ConfigArgs,
        file: PathBuf,
        symbol: String,
    },
    /// Print the declaration shape of a named symbol
    Shape {
        #[command(flatten)]
        config: ConfigArgs,
        file: PathBuf,
        symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Mcp { config, warmup } => {
            tshover_mcp::run_stdio_with_options(tshover_mcp::McpOptions {
                config_path: config.config,
                workspace_root: config.workspace_root,
                warmup,
            })
            .await
        }
        Command::Doctor { config } => doctor(&config).await,
        Command::Hover {
            config,
            file,
            line,
            character,
        } => {
            let file = resolve_file(&file)?;
            let (loaded, client, engine) = start_engine(&config).await?;
            let text = engine.hover_at_position(&file, line, character).await;
            stop_engine(client, engine).await?;
            print_or_placeholder(
                &text?,
                &tshover_core::config::no_hover_placeholder(&loaded.config),
            );
            Ok(())
        }
        Command::Symbol {
            config,
            file,
            symbol,
        } => {
            let file = resolve_file(&file)?;
            let (loaded, client, engine) = start_engine(&config).await?;
            let text = engine.hover_at_symbol(&file, &symbol).await;
            stop_engine(client, engine).await?;
            print_or_placeholder(
                &text?,
                &tshover_core::config::no_hover_placeholder(&loaded.config),
            );
            Ok(())
        }
        Command::Shape {
            config,
            file,
            symbol,
        } => {
            let file = resolve_file(&file)?;
            let (loaded, client, engine) = start_engine(&config).await?;
            let shape = engine.public_type_shape(&file, &symbol).await;
            stop_engine(client, engine).await?;
            print_or_placeholder(
                &shape?,
                &tshover_core::config::no_type_placeholder(&loaded.config),
            );
            Ok(())
        }
    }
}

async fn doctor(args: &ConfigArgs) -> Result<()> {
    let loaded =
        tshover_core::config::load_config(args.config.as_deref(), args.workspace_root.as_deref())?;

    println!("config_source: {:?}", loaded.source);
    println!("workspace_root: {}", loaded.workspace_root.display());

    let server = tshover_core::config::resolved_server(&loaded.config, &loaded.workspace_root);
    println!("server.command: {:?}", server.command);
    println!("server.args: {:?}", server.args);
    println!("server.root_dir: {}", server.root_dir.display());
    println!("server.language_id: {:?}", server.language_id);
    println!(
        "server.adapter: {}",
        tshover_lsp::resolve_adapter(server.adapter.as_deref(), &server.command)?.name()
    );
    println!(
        "server.timeouts_ms: initialize={} request={} warmup_delay={}",
        server.initialize_timeout.as_millis(),
        server.request_timeout.as_millis(),
        server.warmup_delay.as_millis()
    );

    let options = EngineOptions::from_config(&loaded.config);
    println!("cache.max_entries: {}", options.cache_max_entries);
    println!(
        "engine.provider_timeout_ms: {}",
        options
            .provider_timeout
            .map(|d| d.as_millis().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    match tshover_lsp::preflight_language_server(&server.command).await {
        Ok(version) => {
            let version = if version.is_empty() {
                "<unknown>"
            } else {
                version.as_str()
            };
            println!("server_version: {version}");
            Ok(())
        }
        Err(err) => {
            eprintln!("doctor_error: command={} error={:#}", server.command, err);
            eprintln!(
                "doctor_hint: Install the server with `npm i -g typescript typescript-language-server`."
            );
            eprintln!(
                "doctor_hint: Or set TSHOVER_TSSERVER_COMMAND, or [server].command in the config."
            );
            anyhow::bail!("doctor failed. See stderr for details.")
        }
    }
}

async fn start_engine(args: &ConfigArgs) -> Result<(LoadedConfig, Arc<TsLspClient>, HoverEngine)> {
    let loaded =
        tshover_core::config::load_config(args.config.as_deref(), args.workspace_root.as_deref())?;
    let server = tshover_core::config::resolved_server(&loaded.config, &loaded.workspace_root);
    let client = Arc::new(TsLspClient::start(&server).await?);
    let engine = HoverEngine::new(client.clone(), EngineOptions::from_config(&loaded.config));
    Ok((loaded, client, engine))
}

/// Send `shutdown`/`exit` to the language server once the engine is done with it.
async fn stop_engine(client: Arc<TsLspClient>, engine: HoverEngine) -> Result<()> {
    match reclaim_provider(client, engine) {
        Some(client) => client.shutdown().await,
        // Still shared; the child is killed on drop instead.
        None => Ok(()),
    }
}

fn reclaim_provider<P>(provider: Arc<P>, engine: HoverEngine) -> Option<P> {
    drop(engine);
    Arc::try_unwrap(provider).ok()
}

fn resolve_file(file: &Path) -> Result<PathBuf> {
    file.canonicalize()
        .with_context(|| format!("failed to canonicalize file path: {file:?}"))
}

fn print_or_placeholder(text: &str, placeholder: &str) {
    if text.trim().is_empty() {
        println!("{placeholder}");
    } else {
        println!("{text}");
    }
}
