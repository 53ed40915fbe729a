use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use querygraph_api::{Graph, NodeId};
use querygraph_compiler::{CompiledQuery, ProviderRegistry, QueryCompiler, QueryConfig, ResultMode};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `QUERYGRAPH_LOG=debug`.
const LOG_ENV: &str = "QUERYGRAPH_LOG";

#[derive(Parser)]
#[command(name = "querygraph", version, arg_required_else_help = true)]
struct Cli {
    /// Label providers as JSON (`{"default": {...}, "labels": {...}}`)
    #[arg(long)]
    providers: PathBuf,

    /// Compiler settings as JSON; defaults apply to missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text prepended to every statement (overrides the config file)
    #[arg(long)]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Values a node can take, with their result counts
    Value(NodeArgs),
    /// Number of distinct values of a node
    Count(NodeArgs),
    /// Relations leaving a node
    Relations(NodeArgs),
    /// Root results of the whole graph
    Result(ResultArgs),
    /// Number of nodes carrying a label
    Taxonomy(TaxonomyArgs),
}

#[derive(Args)]
struct NodeArgs {
    /// Graph snapshot as JSON
    #[arg(long)]
    graph: PathBuf,

    /// Id of the node the query is about
    #[arg(long)]
    node: u64,
}

/// Command-line spelling of [`ResultMode`]; the compiler crate stays free of clap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Table,
    Graph,
}

impl From<Mode> for ResultMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Table => ResultMode::Table,
            Mode::Graph => ResultMode::Graph,
        }
    }
}

#[derive(Args)]
struct ResultArgs {
    /// Graph snapshot as JSON
    #[arg(long)]
    graph: PathBuf,

    #[arg(long, value_enum, default_value = "table")]
    mode: Mode,
}

#[derive(Args)]
struct TaxonomyArgs {
    #[arg(long)]
    label: String,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_graph(path: &Path) -> Result<Graph> {
    serde_json::from_str(&read(path)?)
        .with_context(|| format!("{} is not a valid graph snapshot", path.display()))
}

fn load_compiler(cli: &Cli) -> Result<QueryCompiler> {
    let registry = ProviderRegistry::from_json(&read(&cli.providers)?)
        .with_context(|| format!("invalid label providers in {}", cli.providers.display()))?;
    let config = match &cli.config {
        Some(path) => QueryConfig::from_json(&read(path)?)
            .with_context(|| format!("invalid compiler config in {}", path.display()))?,
        None => QueryConfig::default(),
    };
    let mut compiler = QueryCompiler::new(registry, config);
    if let Some(prefix) = &cli.prefix {
        compiler.set_prefix(prefix.clone());
    }
    Ok(compiler)
}

fn compile(cli: &Cli) -> Result<CompiledQuery> {
    let compiler = load_compiler(cli)?;
    let query = match &cli.command {
        Commands::Value(args) => {
            compiler.node_value_query(&load_graph(&args.graph)?, NodeId(args.node))?
        }
        Commands::Count(args) => {
            compiler.node_count_query(&load_graph(&args.graph)?, NodeId(args.node))?
        }
        Commands::Relations(args) => {
            compiler.node_relation_query(&load_graph(&args.graph)?, NodeId(args.node))?
        }
        Commands::Result(args) => {
            compiler.result_query(&load_graph(&args.graph)?, args.mode.into())?
        }
        Commands::Taxonomy(args) => compiler.taxonomy_count_query(&args.label)?,
    };
    Ok(query)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let query = compile(&cli)?;
    tracing::info!(statement = %query.statement, "compiled");

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &query)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PROVIDERS: &str = r#"{
        "labels": {
            "Person": {"constraint_attribute": {"named": "name"}},
            "Movie": {"constraint_attribute": {"named": "title"}}
        }
    }"#;

    const GRAPH: &str = r#"{
        "nodes": [
            {"id": 1, "label": "Person", "internal_label": "person", "type": "root"},
            {"id": 2, "label": "Movie", "internal_label": "movie", "type": "choose",
             "value": [{"label": "Movie", "attributes": {"title": "Alien"}}]}
        ],
        "links": [{"source": 1, "target": 2, "label": "ACTED_IN", "type": "relation"}]
    }"#;

    #[test]
    fn compiles_result_query_from_files() {
        let dir = tempdir().unwrap();
        let providers = dir.path().join("providers.json");
        let graph = dir.path().join("graph.json");
        let config = dir.path().join("config.json");
        std::fs::write(&providers, PROVIDERS).unwrap();
        std::fs::write(&graph, GRAPH).unwrap();
        std::fs::write(&config, r#"{"result_limit": 10}"#).unwrap();

        let cli = Cli::try_parse_from([
            "querygraph",
            "--providers",
            providers.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "result",
            "--graph",
            graph.to_str().unwrap(),
        ])
        .unwrap();
        let query = compile(&cli).unwrap();
        assert_eq!(
            query.statement,
            "MATCH (person:`Person`), (person)-[r0:`ACTED_IN`]->(movie:`Movie`) \
             WHERE movie.title = $movie_title RETURN person.name AS name LIMIT 10"
        );
    }

    #[test]
    fn taxonomy_with_prefix() {
        let dir = tempdir().unwrap();
        let providers = dir.path().join("providers.json");
        std::fs::write(&providers, PROVIDERS).unwrap();

        let cli = Cli::try_parse_from([
            "querygraph",
            "--providers",
            providers.to_str().unwrap(),
            "--prefix",
            "CYPHER 4.4 ",
            "taxonomy",
            "--label",
            "Movie",
        ])
        .unwrap();
        let query = compile(&cli).unwrap();
        assert_eq!(
            query.statement,
            "CYPHER 4.4 MATCH (n:`Movie`) RETURN count(DISTINCT n.title) AS count"
        );
    }

    #[test]
    fn graph_mode_from_command_line() {
        let dir = tempdir().unwrap();
        let providers = dir.path().join("providers.json");
        let graph = dir.path().join("graph.json");
        std::fs::write(&providers, PROVIDERS).unwrap();
        std::fs::write(&graph, GRAPH).unwrap();

        let cli = Cli::try_parse_from([
            "querygraph",
            "--providers",
            providers.to_str().unwrap(),
            "result",
            "--graph",
            graph.to_str().unwrap(),
            "--mode",
            "graph",
        ])
        .unwrap();
        let query = compile(&cli).unwrap();
        assert_eq!(
            query.statement,
            "MATCH (person:`Person`), (person)-[r0:`ACTED_IN`]->(movie:`Movie`) \
             WHERE movie.title = $movie_title RETURN person, [r0] AS relations LIMIT 100"
        );
        assert_eq!(ResultMode::from(Mode::Table), ResultMode::Table);
    }

    #[test]
    fn missing_providers_file_is_reported() {
        let cli = Cli::try_parse_from([
            "querygraph",
            "--providers",
            "/nonexistent/providers.json",
            "taxonomy",
            "--label",
            "Movie",
        ])
        .unwrap();
        let err = compile(&cli).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
