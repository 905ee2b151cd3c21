use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use vfetch_import::{
    BackingStoreImporter, BlobImport, BlobMetadataImport, DatapackStore, FanoutLogger, HandleState, ImportConfig,
    ImportKind, ImportPipeline, ImportRequest, LogEvent, MemoryLogger, PipelineReport, ReloadableConfig,
    StructuredLogger, TracingLogger, TreeImport,
};
use vfetch_model::{Blob, BlobMetadata, Tree};
use vfetch_store::BackingStore;
use vfetch_types::{NodeId, ObjectIdFormat, ProxyHash, RelativePath};

use crate::cli::*;
use crate::fixture::Fixture;

/// Everything a command needs, built from the fixture and config.
struct Engine {
    datapack: Arc<DatapackStore>,
    pipeline: Option<ImportPipeline>,
    logger: Arc<MemoryLogger>,
    id_format: ObjectIdFormat,
}

impl Engine {
    fn new(config: ImportConfig, fixture: &Fixture) -> Self {
        let id_format = config.object_id_format;
        let config = Arc::new(ReloadableConfig::new(config));
        let logger = Arc::new(MemoryLogger::new());
        let primary: Arc<dyn BackingStore> = Arc::new(fixture.primary.build());
        // Misses are reported in the command output and on the tracing stream.
        let sinks = FanoutLogger::new()
            .with_sink(Arc::clone(&logger) as Arc<dyn StructuredLogger>)
            .with_sink(Arc::new(TracingLogger));
        let datapack = Arc::new(DatapackStore::new(primary, Arc::clone(&config)).with_logger(Arc::new(sinks)));
        let pipeline = fixture.secondary.as_ref().map(|secondary| {
            let store: Arc<dyn BackingStore> = Arc::new(secondary.build());
            let importer = BackingStoreImporter::new(store, Arc::clone(&config));
            ImportPipeline::new(Arc::clone(&datapack), Arc::new(importer))
        });
        Self {
            datapack,
            pipeline,
            logger,
            id_format,
        }
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ImportConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ImportConfig::default(),
    };
    let fixture = Fixture::load(&cli.fixture)?;
    let engine = Engine::new(config, &fixture);
    let format = cli.format;

    match cli.command {
        Command::Tree(args) => cmd_tree(&engine, args, format),
        Command::TreeBatch(args) => cmd_batch::<TreeImport>(&engine, &args.keys, format, describe_tree),
        Command::Blob(args) => cmd_blob(&engine, args, format),
        Command::BlobBatch(args) => cmd_batch::<BlobImport>(&engine, &args.keys, format, describe_blob),
        Command::Metadata(args) => cmd_metadata(&engine, args, format),
        Command::MetadataBatch(args) => {
            cmd_batch::<BlobMetadataImport>(&engine, &args.keys, format, describe_metadata)
        }
    }
}

fn parse_node(s: &str) -> anyhow::Result<NodeId> {
    NodeId::from_hex(s).with_context(|| format!("invalid node {s:?}"))
}

fn parse_path(s: &str) -> anyhow::Result<RelativePath> {
    RelativePath::new(s).with_context(|| format!("invalid path {s:?}"))
}

/// Parse `path@node` or a bare `node` (root path).
fn parse_key(key: &str) -> anyhow::Result<ProxyHash> {
    let (path, node) = key.rsplit_once('@').unwrap_or(("", key));
    Ok(ProxyHash::new(parse_path(path)?, parse_node(node)?))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Single keys
// ---------------------------------------------------------------------------

fn cmd_tree(engine: &Engine, args: TreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let proxy = ProxyHash::new(parse_path(&args.path)?, parse_node(&args.node)?);
    let tree_id = proxy.object_id(engine.id_format);
    let tree = if args.local {
        engine.datapack.get_tree_local(&tree_id, &proxy)
    } else {
        engine.datapack.get_tree(proxy.path(), proxy.node(), &tree_id)
    };
    let Some(tree) = tree else {
        anyhow::bail!("tree {proxy} not found");
    };

    match format {
        OutputFormat::Json => print_json(&tree),
        OutputFormat::Text => {
            println!("{} {} ({} entries)", "tree".bold(), proxy.to_string().yellow(), tree.len());
            for (name, entry) in tree.iter() {
                let size = entry.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                println!("  {:<5} {:>8}  {}", entry.entry_type.to_string().cyan(), size, name);
            }
            Ok(())
        }
    }
}

fn cmd_blob(engine: &Engine, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let proxy = ProxyHash::new(parse_path(&args.path)?, parse_node(&args.node)?);
    let Some(blob) = engine.datapack.get_blob_local(&proxy) else {
        anyhow::bail!("blob {proxy} is not available locally");
    };

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "node": proxy.node(),
            "size": blob.size(),
            "contents": String::from_utf8_lossy(blob.contents()),
        })),
        OutputFormat::Text => {
            println!("{} {} ({} bytes)", "blob".bold(), proxy.to_string().yellow(), blob.size());
            print!("{}", String::from_utf8_lossy(blob.contents()));
            Ok(())
        }
    }
}

fn cmd_metadata(engine: &Engine, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let proxy = ProxyHash::new(parse_path(&args.path)?, parse_node(&args.node)?);
    let Some(metadata) = engine.datapack.get_local_blob_metadata(&proxy) else {
        anyhow::bail!("metadata for {proxy} is not available locally");
    };

    match format {
        OutputFormat::Json => print_json(&metadata),
        OutputFormat::Text => {
            println!("{} {}", "metadata".bold(), proxy.to_string().yellow());
            println!("  size:   {}", metadata.size);
            println!("  sha256: {}", metadata.sha256);
            if let Some(blake3) = metadata.blake3 {
                println!("  blake3: {blake3}");
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Ok,
    Failed,
    Deferred,
    Abandoned,
}

#[derive(Serialize)]
struct BatchLine {
    key: String,
    status: Status,
    detail: String,
}

#[derive(Serialize)]
struct BatchView {
    report: PipelineReport,
    results: Vec<BatchLine>,
    misses: Vec<LogEvent>,
}

fn describe_tree(tree: &Tree) -> String {
    format!("{} entries", tree.len())
}

fn describe_blob(blob: &Blob) -> String {
    format!("{} bytes", blob.size())
}

fn describe_metadata(metadata: &BlobMetadata) -> String {
    format!("{} bytes, sha256 {}", metadata.size, metadata.sha256.short_hex())
}

fn cmd_batch<K: ImportKind>(
    engine: &Engine,
    keys: &[String],
    format: OutputFormat,
    describe: fn(&K::Output) -> String,
) -> anyhow::Result<()> {
    let mut requests = Vec::with_capacity(keys.len());
    let mut handles = Vec::with_capacity(keys.len());
    for key in keys {
        let proxy = parse_key(key)?;
        let (request, handle) = ImportRequest::<K>::new(proxy.object_id(engine.id_format), proxy);
        requests.push(request);
        handles.push((key.clone(), handle));
    }

    // Deferred requests stay alive until every handle has been inspected so
    // that they report as deferred rather than abandoned.
    let (report, _deferred) = match &engine.pipeline {
        Some(pipeline) => (pipeline.import(requests), Vec::new()),
        None => {
            let outcome = engine.datapack.import_batch(requests);
            let report = PipelineReport {
                kind: K::KIND,
                requests: outcome.requests,
                unique_keys: outcome.unique_keys,
                primary_resolved: outcome.fulfilled + outcome.failed,
                deferred: outcome.deferred.len(),
                secondary_fulfilled: 0,
                secondary_failed: 0,
            };
            (report, outcome.into_deferred())
        }
    };

    let results: Vec<BatchLine> = handles
        .into_iter()
        .map(|(key, mut handle)| {
            let (status, detail) = match handle.try_take() {
                HandleState::Ready(Ok(output)) => (Status::Ok, describe(&output)),
                HandleState::Ready(Err(err)) => (Status::Failed, err.to_string()),
                HandleState::Pending => (Status::Deferred, "awaiting secondary import".into()),
                HandleState::Abandoned => (Status::Abandoned, String::new()),
            };
            BatchLine { key, status, detail }
        })
        .collect();

    let view = BatchView {
        report,
        results,
        misses: engine.logger.events(),
    };
    match format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            print_batch(&view);
            Ok(())
        }
    }
}

fn print_batch(view: &BatchView) {
    let report = &view.report;
    println!(
        "{} batch: {} requests, {} unique keys",
        report.kind.to_string().bold(),
        report.requests,
        report.unique_keys
    );
    for line in &view.results {
        let status = match line.status {
            Status::Ok => "ok".green(),
            Status::Failed => "failed".red(),
            Status::Deferred => "deferred".yellow(),
            Status::Abandoned => "abandoned".dimmed(),
        };
        println!("  {:<9} {}  {}", status, line.key, line.detail.dimmed());
    }
    if report.deferred > 0 {
        println!(
            "secondary import: {} fulfilled, {} failed, {} deferred",
            report.secondary_fulfilled.to_string().green(),
            report.secondary_failed.to_string().red(),
            report.deferred
        );
    }
    for event in &view.misses {
        let LogEvent::FetchMiss { kind, node, reason, .. } = event;
        println!("  {} {} {}: {}", "miss".yellow(), kind, node.short_hex(), reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_with_path() {
        let proxy = parse_key(&format!("src/lib.rs@{}", "ab".repeat(20))).unwrap();
        assert_eq!(proxy.path().as_str(), "src/lib.rs");
        assert_eq!(proxy.node(), &NodeId::from_array([0xab; 20]));
    }

    #[test]
    fn bare_key_is_root() {
        let proxy = parse_key(&"01".repeat(20)).unwrap();
        assert!(proxy.path().is_root());
    }

    #[test]
    fn bad_keys_are_rejected() {
        assert!(parse_key("nothex").is_err());
        assert!(parse_key(&format!("/abs@{}", "01".repeat(20))).is_err());
    }

    #[test]
    fn batch_reports_deferred_without_secondary() {
        let fixture = Fixture::parse(r#"{"primary": {"blobs": [{"node": "0101010101010101010101010101010101010101", "contents": "x"}]}}"#)
            .unwrap();
        let engine = Engine::new(ImportConfig::default(), &fixture);
        let keys = vec!["01".repeat(20), format!("a@{}", "02".repeat(20))];

        cmd_batch::<BlobImport>(&engine, &keys, OutputFormat::Json, describe_blob).unwrap();

        assert_eq!(engine.logger.events().len(), 1);
        assert_eq!(engine.datapack.watches(vfetch_store::ObjectKind::Blob).completed(), 2);
    }
}
