//! termql CLI
//!
//! Command-line access to the query resolution engine:
//! - compile node queries to SQL templates or inverted-index queries,
//! - rewrite them into CNF/DNF or simplify them,
//! - parse projections and qualify them against a JSON schema file.
//!
//! Output is JSON on stdout; `--pretty` prints the display forms instead.

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use termql_schema::{SchemaIndex, StaticSchema, TypeId};
use termql_select::{parse_selects, QualifierMode};
use termql_spec::simplify;
use termql_store::{EngineConfig, QueryEngine};

#[derive(Parser)]
#[command(name = "termql")]
#[command(author, version, about = "termql: node query compilation and projection qualification")]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print display forms instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node query commands
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },

    /// Projection commands
    Select {
        #[command(subcommand)]
        command: SelectCommands,
    },
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Compile a node query for a storage backend
    #[command(group(ArgGroup::new("backend").required(true).args(["sql", "index"])))]
    Compile {
        /// Parameterized WHERE-clause
        #[arg(long)]
        sql: bool,
        /// Inverted-index boolean query
        #[arg(long)]
        index: bool,
        query: String,
    },

    /// Rewrite a node query into conjunctive or disjunctive normal form
    #[command(group(ArgGroup::new("form").required(true).args(["cnf", "dnf"])))]
    Normalize {
        #[arg(long)]
        cnf: bool,
        #[arg(long)]
        dnf: bool,
        query: String,
    },

    /// Flatten, de-duplicate and fold constants in a node query
    Simplify { query: String },
}

#[derive(Subcommand)]
enum SelectCommands {
    /// Parse a projection into select tokens
    Parse { selects: String },

    /// Qualify a projection against a schema
    Qualify(QualifyArgs),
}

#[derive(Args)]
struct QualifyArgs {
    /// Schema file: JSON array of entity types
    #[arg(long)]
    schema: PathBuf,

    /// Domain types as `<graph uuid>.<type id>` (repeatable)
    #[arg(long = "domain", required = true)]
    domains: Vec<TypeId>,

    /// Overrides `select.mode` from the config
    #[arg(long)]
    mode: Option<QualifierMode>,

    selects: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(out) => println!("{out}"),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Fails only if a subscriber is already set, which keeps that one.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();
}

fn run(cli: Cli) -> Result<String> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Query { command } => {
            let engine = QueryEngine::with_schema(config, SchemaIndex::default());
            match command {
                QueryCommands::Compile { sql, query, .. } => {
                    let spec = engine.parse(&query)?;
                    if sql {
                        let q = engine.compile_sql(&spec)?;
                        if pretty {
                            return Ok(pretty_sql(&q));
                        }
                        json(&q)
                    } else {
                        let q = engine.compile_index(&spec)?;
                        if pretty {
                            return Ok(q.to_string());
                        }
                        json(&q)
                    }
                }
                QueryCommands::Normalize { cnf, query, .. } => {
                    let spec = engine.parse(&query)?;
                    if cnf {
                        let nf = engine.normalize_cnf(&spec)?;
                        if pretty {
                            return Ok(nf.to_string());
                        }
                        json(&nf)
                    } else {
                        let nf = engine.normalize_dnf(&spec)?;
                        if pretty {
                            return Ok(nf.to_string());
                        }
                        json(&nf)
                    }
                }
                QueryCommands::Simplify { query } => {
                    let spec = simplify(&engine.parse(&query)?);
                    if pretty {
                        return Ok(spec.to_string());
                    }
                    json(&spec)
                }
            }
        }
        Commands::Select { command } => match command {
            SelectCommands::Parse { selects } => {
                let selects = parse_selects(&selects)?;
                if pretty {
                    return Ok(lines(&selects));
                }
                json(&selects)
            }
            SelectCommands::Qualify(args) => {
                if let Some(mode) = args.mode {
                    config.select.mode = mode;
                }
                let text = fs::read_to_string(&args.schema)
                    .with_context(|| format!("reading schema {}", args.schema.display()))?;
                let schema = StaticSchema::from_json(&text)
                    .with_context(|| format!("parsing schema {}", args.schema.display()))?;
                let engine = QueryEngine::new(config, &schema)?;
                let selection = engine.select(&args.selects, &args.domains)?;
                if pretty {
                    return Ok(lines(&selection.selects));
                }
                json(&selection)
            }
        },
    }
}

fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn lines<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty_sql(q: &termql_spec::SqlQuery) -> String {
    let mut out = q.template.clone();
    for (i, p) in q.params.iter().enumerate() {
        out.push_str(&format!("\n  ?{} = {p}", i + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run_args(args: &[&str]) -> Result<String> {
        let mut argv = vec!["termql"];
        argv.extend_from_slice(args);
        run(Cli::try_parse_from(argv)?)
    }

    #[test]
    fn compiles_to_sql() {
        let out = run_args(&["query", "compile", "--sql", "--pretty", "number:3 OR code:x"]).unwrap();
        assert_eq!(
            out,
            "(number = ?) OR (code IS NOT NULL AND code = ?)\n  ?1 = 3\n  ?2 = 'x'"
        );
    }

    #[test]
    fn tracing_init_is_repeatable() {
        init_tracing(0);
        init_tracing(2);
    }

    #[test]
    fn compiles_word_prefix_to_index_prefix() {
        let out = run_args(&["query", "compile", "--index", "--pretty", "p.prefLabel.en:Ca*"]).unwrap();
        assert_eq!(out, "properties.prefLabel.words.en:ca*");
    }

    #[test]
    fn backend_flag_is_required() {
        assert!(Cli::try_parse_from(["termql", "query", "compile", "code:x"]).is_err());
        assert!(Cli::try_parse_from(["termql", "query", "compile", "--sql", "--index", "code:x"]).is_err());
    }

    #[test]
    fn relational_compile_rejects_index_only_leaves() {
        let err = run_args(&["query", "compile", "--sql", "p.prefLabel:cat"]).unwrap_err();
        assert!(err.to_string().contains("relational"), "err={err}");
        assert!(run_args(&["query", "compile", "--index", "p.prefLabel:cat"]).is_ok());
    }

    #[test]
    fn parses_selects_as_json() {
        let out = run_args(&["select", "parse", "id,refs.broader:2"]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v[0]["select"], "id");
        assert_eq!(v[1]["select"], "reference");
        assert_eq!(v[1]["depth"], 2);
    }

    #[test]
    fn qualifies_against_schema_file() {
        let g = uuid::Uuid::new_v4();
        let concept = TypeId::new(g, "Concept");
        let schema = StaticSchema::new(vec![termql_schema::EntityType::builder(concept.clone())
            .text_attribute("prefLabel")
            .reference_attribute("broader", concept.clone())
            .build()]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&schema).unwrap()).unwrap();

        let path = file.path().to_string_lossy().to_string();
        let domain = concept.to_string();
        let out = run_args(&[
            "select",
            "qualify",
            "--pretty",
            "--schema",
            &path,
            "--domain",
            &domain,
            "--mode",
            "depth_bounded",
            "refs.broader:2,props.prefLabel",
        ])
        .unwrap();
        assert_eq!(
            out,
            format!("{g}.Concept.references.broader:2\n{g}.Concept.properties.prefLabel")
        );
    }
}
