use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use docfilter_core::{FilterSet, FormData};
use docfilter_storage::Catalog;
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docfilter")]
#[command(about = "Run declared filter sets against fixture documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct Source {
    /// Filter-set declarations (JSON).
    #[arg(long, env = "DOCFILTER_CONFIG", default_value = "demos/books.json")]
    config: PathBuf,
    /// NDJSON documents; the file stem is the default index.
    #[arg(long, env = "DOCFILTER_FIXTURES")]
    fixtures: Option<PathBuf>,
}

#[derive(Args)]
struct Invocation {
    #[command(flatten)]
    source: Source,
    #[arg(long)]
    set: String,
    /// Form input as key=value; repeatable.
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Bind, build and execute a search.
    Search(Invocation),
    /// Print the request body a search would send, without executing it.
    Explain(Invocation),
    /// Print a filter set's widgets.
    Form {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        set: String,
    },
    /// List declared filter sets.
    Sets {
        #[command(flatten)]
        source: Source,
    },
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

impl Source {
    fn catalog(&self) -> Result<Catalog> {
        Catalog::load(&self.config, self.fixtures.as_deref())
            .with_context(|| format!("loading {}", self.config.display()))
    }
}

fn filter_set<'a>(catalog: &'a Catalog, name: &str) -> Result<&'a FilterSet> {
    catalog.get(name).ok_or_else(|| {
        anyhow!(
            "unknown filter set '{name}' (declared: {})",
            catalog.names().collect::<Vec<_>>().join(", ")
        )
    })
}

fn run(cmd: Cmd) -> Result<serde_json::Value> {
    Ok(match cmd {
        Cmd::Search(inv) => {
            let catalog = inv.source.catalog()?;
            let set = filter_set(&catalog, &inv.set)?;
            let data: FormData = inv.params.into_iter().collect();
            let bound = set.bind(&data);
            let paginated = bound.paginate()?;
            debug!(body = %paginated.search.to_json(), "executing");
            let response = paginated.search.execute()?;
            json!({
                "total": response.total,
                "hits": response.hits,
                "page": paginated.page,
                "errors": bound.form().errors(),
            })
        }
        Cmd::Explain(inv) => {
            let catalog = inv.source.catalog()?;
            let set = filter_set(&catalog, &inv.set)?;
            let data: FormData = inv.params.into_iter().collect();
            let bound = set.bind(&data);
            let paginated = bound.paginate()?;
            json!({
                "index": paginated.search.index(),
                "body": paginated.search.to_json(),
                "page": paginated.page,
                "errors": bound.form().errors(),
            })
        }
        Cmd::Form { source, set } => {
            let catalog = source.catalog()?;
            json!(filter_set(&catalog, &set)?.form())
        }
        Cmd::Sets { source } => {
            let catalog = source.catalog()?;
            json!(catalog.names().collect::<Vec<_>>())
        }
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();
    let out = run(cli.cmd)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
