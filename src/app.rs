//! Application orchestrator: CLI surface, runtime setup, and command
//! dispatch.

use crate::client::ReplayStream;
use crate::config::{CsvConfig, SinkConfig, DEFAULT_BUFFER_SIZE, DEFAULT_BUNDLE_SIZE};
use crate::csv::Processor;
use crate::observability;
use crate::schema;
use crate::sinker::EntitySink;
use crate::store;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "graphcsv", version)]
#[command(about = "Sink block-scoped entity changes into CSV-ready bundles")]
pub struct Cli {
    /// Default log directive when RUST_LOG is unset.
    #[arg(long, global = true, env = "SINK_GRAPHCSV_LOG", default_value = "graphcsv=info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the sink against a replayed block stream.
    Run(RunArgs),
    /// Creates CSV files ready for insertion into PostgreSQL.
    Tocsv(TocsvArgs),
    /// Prints the entities declared in a GraphQL schema.
    ListEntities(ListEntitiesArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Folder the JSONL bundles upload to.
    pub dest_folder: PathBuf,
    /// Replay file holding the captured block stream.
    pub replay_file: PathBuf,
    /// Name of the module whose output is consumed.
    pub module: String,
    /// Process blocks up to this one, exclusive.
    pub stop_block: u64,

    /// Start processing at this block.
    #[arg(long, env = "SINK_GRAPHCSV_START_BLOCK", default_value_t = 0)]
    pub start_block: u64,

    /// Size of output bundles, in blocks.
    #[arg(long, env = "SINK_GRAPHCSV_BUNDLE_SIZE", default_value_t = DEFAULT_BUNDLE_SIZE)]
    pub bundle_size: u64,

    /// Comma-separated list of entities (alternative to --graphql-schema).
    #[arg(long, env = "SINK_GRAPHCSV_ENTITIES")]
    pub entities: Option<String>,

    /// Path to a GraphQL schema to read the entity list from
    /// (alternative to --entities).
    #[arg(long, env = "SINK_GRAPHCSV_GRAPHQL_SCHEMA")]
    pub graphql_schema: Option<PathBuf>,

    /// Local folder used as working directory.
    #[arg(long, env = "SINK_GRAPHCSV_WORKING_DIR", default_value = "./workdir")]
    pub working_dir: PathBuf,

    /// Chain id recorded in the proof-of-indexing table.
    #[arg(long, env = "SINK_GRAPHCSV_CHAIN_ID", default_value = "ethereum/mainnet")]
    pub chain_id: String,

    /// Staging buffer size, in bytes.
    #[arg(long, env = "SINK_GRAPHCSV_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

#[derive(Debug, Args)]
pub struct TocsvArgs {
    /// Folder containing one folder of JSONL bundles per entity.
    pub source_folder: PathBuf,
    /// Folder where CSV files are created, one subfolder per entity.
    pub dest_folder: PathBuf,
    /// Name of the entity to process.
    pub entity: String,
    /// Where CSV creation stops, exclusive.
    pub stop_block: u64,

    /// Size of output bundles, in blocks.
    #[arg(long, env = "SINK_GRAPHCSV_BUNDLE_SIZE", default_value_t = DEFAULT_BUNDLE_SIZE)]
    pub bundle_size: u64,

    /// Path to the GraphQL schema.
    #[arg(long, env = "SINK_GRAPHCSV_GRAPHQL_SCHEMA", default_value = "schema.graphql")]
    pub graphql_schema: PathBuf,

    /// Fail on UPDATE of an entity that was never seen.
    #[arg(long, env = "SINK_GRAPHCSV_STRICT")]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct ListEntitiesArgs {
    /// Path to the GraphQL schema.
    pub graphql_schema: PathBuf,
}

/// Entrypoint: parse the CLI, initialize logging and the runtime, dispatch.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_logging(&cli.log);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match cli.command {
        Command::Run(args) => runtime.block_on(run_sink(args)),
        Command::Tocsv(args) => run_tocsv(args),
        Command::ListEntities(args) => run_list_entities(args),
    }
}

async fn run_sink(args: RunArgs) -> Result<()> {
    let entities = match (&args.entities, &args.graphql_schema) {
        (Some(_), Some(_)) => {
            bail!("you must only use one of these flags: '--entities' or '--graphql-schema'")
        }
        (Some(list), None) => list.split(',').map(str::to_string).collect(),
        (None, Some(path)) => schema::entity_names_from_schema(path)?,
        (None, None) => {
            bail!("you must set one of these flags: '--entities' or '--graphql-schema'")
        }
    };

    let config = SinkConfig {
        dest_folder: args.dest_folder.clone(),
        working_dir: args.working_dir.clone(),
        output_module: args.module.clone(),
        start_block: args.start_block,
        stop_block: args.stop_block,
        bundle_size: args.bundle_size,
        buffer_size: args.buffer_size,
        chain_id: args.chain_id.clone(),
        start_poi: None,
    };
    config.validate()?;

    let dest_store = store::local_store(&config.dest_folder)?;
    let mut sink = EntitySink::new(&config, &entities, dest_store)?;
    let mut stream = ReplayStream::open(&args.replay_file)?;

    tracing::info!(
        stop_block = config.stop_block,
        entity_count = entities.len(),
        "ready, waiting for stream"
    );

    tokio::select! {
        result = sink.run(&mut stream) => {
            result.context("sink terminated with error")?;
            tracing::info!("run terminated gracefully");
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            bail!("interrupted before reaching stop block")
        }
    }
}

fn run_tocsv(args: TocsvArgs) -> Result<()> {
    let config = CsvConfig {
        source_folder: args.source_folder,
        dest_folder: args.dest_folder,
        entity: args.entity,
        schema_path: args.graphql_schema,
        stop_block: args.stop_block,
        bundle_size: args.bundle_size,
        strict: args.strict,
    };

    let mut processor = Processor::new(&config)?;
    processor.run()?;
    tracing::info!("run terminated gracefully");
    Ok(())
}

fn run_list_entities(args: ListEntitiesArgs) -> Result<()> {
    for entity in schema::entity_names_from_schema(&args.graphql_schema)? {
        println!("{entity}");
    }
    Ok(())
}
