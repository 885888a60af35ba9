//! CLI command implementations

use anyhow::Context;
use mosaic_core::{SourceFile, SourceTree, SynthesisConfig};
use mosaic_deps::{RawDependencySpec, StaticOracle};
use mosaic_indexer::{ComponentRequest, build_tree};
use mosaic_orchestrator::{JobState, SynthesisRequest, Synthesizer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A synthesis job as written in a TOML job file.
#[derive(Debug, Deserialize)]
struct JobFile {
    /// Source tree root, relative to the job file.
    source: PathBuf,
    /// Output root, relative to the job file.
    #[serde(default = "default_output")]
    output: PathBuf,
    #[serde(default)]
    components: Vec<ComponentRequest>,
    #[serde(default)]
    dependencies: Vec<RawDependencySpec>,
    /// Package name to published versions, served by a static oracle.
    #[serde(default)]
    versions: BTreeMap<String, Vec<String>>,
}

fn default_output() -> PathBuf {
    PathBuf::from("mosaic-out")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<SynthesisConfig> {
    let config = match path {
        Some(path) => SynthesisConfig::load(path)?,
        None => SynthesisConfig::default().with_env_overrides()?,
    };
    tracing::debug!("Config: {:?}", config);
    Ok(config)
}

pub async fn synthesize(config: SynthesisConfig, job_path: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(job_path).with_context(|| format!("reading job file {}", job_path.display()))?;
    let job: JobFile = toml::from_str(&text).with_context(|| format!("parsing job file {}", job_path.display()))?;

    let base = job_path.parent().unwrap_or(Path::new("."));
    let source = base.join(&job.source);
    let output = output.unwrap_or_else(|| base.join(&job.output));
    tracing::info!("Synthesizing from {} into {}", source.display(), output.display());

    let tree = read_tree(&source)?;
    let oracle = StaticOracle::from_table(&job.versions)?;
    tracing::info!("Static oracle knows {} packages", oracle.len());

    let mut request = SynthesisRequest::new(tree, output).dependencies(job.dependencies);
    for component in job.components {
        request = request.component(component);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping at the next phase boundary");
            on_interrupt.cancel();
        }
    });

    let synthesizer = Synthesizer::new(config, Arc::new(oracle));
    let id = synthesizer.submit();
    let result = synthesizer.run_job(id, request, cancel).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    if result.state == JobState::Failed {
        anyhow::bail!("job {id} failed");
    }
    if !result.resolution.is_complete() {
        tracing::warn!(
            "{} dependency conflicts need manual resolution",
            result.resolution.conflicts.len()
        );
    }
    Ok(())
}

pub fn scan(dir: &Path) -> anyhow::Result<()> {
    tracing::info!("Scanning {}", dir.display());

    let tree = read_tree(dir)?;
    let output = build_tree(&tree);
    let graph = &output.graph;

    println!("files:    {}", graph.file_count());
    println!("edges:    {}", graph.edge_count());
    let packages: Vec<&str> = graph.external_packages().collect();
    println!("packages: {}", packages.len());
    for package in packages {
        println!("  {package}");
    }
    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

/// Read every non-ignored file under `root` into a source tree with root-relative paths.
fn read_tree(root: &Path) -> anyhow::Result<SourceTree> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(root).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cannot read entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", path.display(), e);
                continue;
            }
        };
        files.push(SourceFile::new(relative, content));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Read {} files from {}", files.len(), root.display());
    Ok(SourceTree::new(files))
}
