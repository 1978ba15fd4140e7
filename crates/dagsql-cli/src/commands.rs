use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use dagsql_dag::ValueGraph;
use dagsql_store::{SqliteValueStore, StoreConfig};
use dagsql_types::Value;
use tracing::debug;

use crate::cli::*;

const DEFAULT_DB: &str = "dagsql.db";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(cli.config.as_deref(), cli.db)?;
    let format = cli.format;
    let open = || -> anyhow::Result<ValueGraph<SqliteValueStore>> {
        Ok(ValueGraph::new(SqliteValueStore::open(&config)?))
    };
    match cli.command {
        Command::Ingest(args) => cmd_ingest(&open()?, args, format),
        Command::Encode(args) => cmd_encode(&open()?, args),
        Command::Dump(args) => cmd_dump(&open()?, args),
        Command::Roots => cmd_roots(&open()?, format),
        Command::Cid(args) => cmd_cid(&open()?, args, format),
        Command::Verify(args) => cmd_verify(&open()?, args, format),
        Command::Decode(args) => cmd_decode(args),
    }
}

/// Config file first, then `--db`, then the default file name.
fn store_config(config: Option<&Path>, db: Option<PathBuf>) -> anyhow::Result<StoreConfig> {
    let mut store = match config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(db) = db {
        store.path = Some(db);
    }
    if store.path.is_none() {
        store.path = Some(PathBuf::from(DEFAULT_DB));
    }
    debug!(path = ?store.path, journal_mode = %store.journal_mode, "store config");
    Ok(store)
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn parse_document(text: &[u8]) -> anyhow::Result<Value> {
    let json: serde_json::Value = serde_json::from_slice(text).context("input is not valid JSON")?;
    Ok(Value::from_json(&json)?)
}

fn cmd_ingest(
    graph: &ValueGraph<SqliteValueStore>,
    args: IngestArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let value = parse_document(&read_input(&args.file)?)?;
    let node = graph.put_root(&args.root, &value)?;
    let cid = graph.content_id(node)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "root": args.root, "node": node.get(), "cid": cid.to_hex() })
        ),
        OutputFormat::Text => {
            println!("{} Stored root {} at {}", "✓".green().bold(), args.root.yellow(), node);
            println!("  Content id: {}", cid.to_hex().cyan());
        }
    }
    Ok(())
}

fn cmd_encode(graph: &ValueGraph<SqliteValueStore>, args: EncodeArgs) -> anyhow::Result<()> {
    let node = graph.root_node(&args.root)?;
    match args.out {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut file = std::io::BufWriter::new(file);
            let stats = graph.encode_to(node, &mut file)?;
            file.flush()?;
            eprintln!(
                "{} Wrote {} bytes ({} nodes) to {}",
                "✓".green().bold(),
                stats.bytes,
                stats.nodes,
                path.display()
            );
        }
        None => println!("{}", hex::encode(graph.encode(node)?)),
    }
    Ok(())
}

fn cmd_dump(graph: &ValueGraph<SqliteValueStore>, args: RootArgs) -> anyhow::Result<()> {
    let value = graph.dump_root(&args.root)?;
    println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);
    Ok(())
}

fn cmd_roots(graph: &ValueGraph<SqliteValueStore>, format: OutputFormat) -> anyhow::Result<()> {
    let roots = graph.roots()?;
    match format {
        OutputFormat::Json => {
            let list: Vec<_> = roots
                .iter()
                .map(|(name, node)| serde_json::json!({ "root": name, "node": node.get() }))
                .collect();
            println!("{}", serde_json::Value::Array(list));
        }
        OutputFormat::Text if roots.is_empty() => println!("No roots."),
        OutputFormat::Text => {
            for (name, node) in roots {
                println!("{}  {}", name.yellow().bold(), node.to_string().dimmed());
            }
        }
    }
    Ok(())
}

fn cmd_cid(
    graph: &ValueGraph<SqliteValueStore>,
    args: RootArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let cid = graph.content_id_root(&args.root)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "root": args.root, "cid": cid.to_hex() })
        ),
        OutputFormat::Text => println!("{}", cid.to_hex()),
    }
    Ok(())
}

fn cmd_verify(
    graph: &ValueGraph<SqliteValueStore>,
    args: RootArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = graph.verify_root(&args.root)?;
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::json!({
                "root": args.root,
                "node": report.node.get(),
                "cid": report.content_id.to_hex(),
                "bytes": report.bytes,
                "engines_agree": report.engines_agree,
                "roundtrips": report.roundtrips,
            })
        );
    } else {
        let mark = |ok: bool| if ok { "ok".green() } else { "MISMATCH".red().bold() };
        let head = if report.is_ok() { "✓".green().bold() } else { "✗".red().bold() };
        println!("{} Root {} ({} bytes)", head, args.root.yellow(), report.bytes);
        println!("  Content id: {}", report.content_id.to_hex().cyan());
        println!("  Stack vs recursive encoder: {}", mark(report.engines_agree));
        println!("  Decode round-trip: {}", mark(report.roundtrips));
    }
    if !report.is_ok() {
        anyhow::bail!("verification failed for root {}", args.root);
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let input = read_input(&args.file)?;
    let bytes = if args.hex {
        let text = String::from_utf8(input).context("hex input is not text")?;
        hex::decode(text.trim()).context("invalid hex")?
    } else {
        input
    };
    let value = dagsql_cbor::decode(&bytes)?;
    println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);
    Ok(())
}
