//! CLI entry point for symbol ranking and search.
//!
//! Loads settings, builds components through the dependency registry and
//! prints rankings or search results.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use comfy_table::{Attribute, Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use serde::Serialize;
use std::path::PathBuf;
use symrank::logging::init_logging;
use symrank::{DependencyRegistry, FlowPolicy, Settings, SymbolGraph};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Symbol ranking and relevance search
#[derive(Parser)]
#[command(
    name = "symrank",
    version = env!("CARGO_PKG_VERSION"),
    about = "Rank code symbols and search them by meaning",
    long_about = "Rank the symbols of an indexed codebase by structural importance and search them by combining rank with embedding similarity.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "SYMRANK_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .symrank directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Display active settings")]
    Config,

    #[command(about = "Print the most important symbols")]
    Rank {
        /// Number of symbols to print
        #[arg(short, long, default_value_t = 20)]
        top: usize,

        /// Edge orientation (overrides config)
        #[arg(long)]
        flow_policy: Option<FlowPolicy>,
    },

    #[command(about = "Find the symbols most relevant to a query")]
    Search {
        /// Free-text query
        query: String,

        /// Number of results (defaults to search.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Rank with the query as teleport preference instead of combining scores
        #[arg(long)]
        personalized: bool,
    },
}

#[derive(Debug, Serialize)]
struct Row<'a> {
    rank: usize,
    symbol_id: &'a str,
    kind: Option<&'a str>,
    path: Option<&'a str>,
    score: f64,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path).map_err(|e| {
            anyhow::anyhow!("Configuration error loading from {}: {e}", path.display())
        })?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };

    init_logging(&settings.logging);

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }

        Commands::Rank { top, flow_policy } => {
            if let Some(policy) = flow_policy {
                settings.subgraph.flow_policy = policy;
            }
            settings.validate()?;

            let registry = DependencyRegistry::new(settings);
            let graph = registry.symbol_graph()?;
            let rank = registry.symbol_rank()?;
            let outcome = rank.outcome();

            if !outcome.converged {
                eprintln!(
                    "Warning: ranking stopped after {} iterations without converging",
                    outcome.iterations
                );
            }

            let rows: Vec<(&str, f64)> = outcome
                .top(top)
                .into_iter()
                .map(|(id, score)| (id.as_str(), score))
                .collect();
            print_rows(&graph, &rows, cli.json)?;
        }

        Commands::Search {
            query,
            top_k,
            personalized,
        } => {
            settings.validate()?;
            let top_k = top_k.unwrap_or(settings.search.default_top_k);

            let registry = DependencyRegistry::new(settings);
            let graph = registry.symbol_graph()?;
            let search = registry.symbol_search()?;

            let results = if personalized {
                search.rank_search(&query, top_k)?
            } else {
                search.search(&query, top_k)?
            };

            let rows: Vec<(&str, f64)> = results
                .iter()
                .map(|r| (r.symbol_id.as_str(), r.score))
                .collect();
            print_rows(&graph, &rows, cli.json)?;
        }
    }

    Ok(())
}

fn print_rows(graph: &SymbolGraph, rows: &[(&str, f64)], json: bool) -> anyhow::Result<()> {
    let rows: Vec<Row> = rows
        .iter()
        .enumerate()
        .map(|(i, &(id, score))| {
            let symbol = graph.get_symbol(id).ok();
            Row {
                rank: i + 1,
                symbol_id: id,
                kind: symbol.map(|s| s.kind.as_str()),
                path: symbol.map(|s| s.location.path.as_str()),
                score,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No symbols found");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(
        ["#", "Score", "Kind", "Symbol", "Path"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    for row in rows {
        table.add_row(vec![
            row.rank.to_string(),
            format!("{:.6}", row.score),
            row.kind.unwrap_or("-").to_string(),
            row.symbol_id.to_string(),
            row.path.unwrap_or("-").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
