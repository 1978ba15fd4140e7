use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dagsql",
    about = "DAG-SQL: content-addressed value graphs in SQLite",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database file (overrides the config file's `path`)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// TOML store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a JSON document as a value graph under a root handle
    Ingest(IngestArgs),
    /// Write the canonical DAG-CBOR encoding of a root
    Encode(EncodeArgs),
    /// Print a root as JSON
    Dump(RootArgs),
    /// List root handles
    Roots,
    /// Print the content id (BLAKE3 of the encoding) of a root
    Cid(RootArgs),
    /// Cross-check the encoders and decoder on a root
    Verify(RootArgs),
    /// Strictly decode a DAG-CBOR file and print it as JSON
    Decode(DecodeArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// JSON file to read; `-` reads stdin
    pub file: PathBuf,
    #[arg(long)]
    pub root: String,
}

#[derive(Args)]
pub struct EncodeArgs {
    #[arg(long)]
    pub root: String,
    /// Write raw bytes here instead of printing hex
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct RootArgs {
    #[arg(long)]
    pub root: String,
}

#[derive(Args)]
pub struct DecodeArgs {
    /// DAG-CBOR file; `-` reads stdin
    pub file: PathBuf,
    /// Treat the input as hex text
    #[arg(long)]
    pub hex: bool,
}
