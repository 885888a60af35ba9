//! Synthesis pipeline: extract components in parallel, resolve dependencies
//! serially, then assemble the output.

use crate::assemble;
use crate::error::JobError;
use crate::job::{JobId, JobRegistry, JobState};
use mosaic_core::{ImportGraph, SourceTree, SynthesisConfig, Warning, WarningKind};
use mosaic_deps::{RawDependencySpec, ResolutionResult, VersionOracle, canonical_name, normalize, resolve_specs};
use mosaic_indexer::{Component, ComponentRequest, build_tree, extract};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything one synthesis job consumes.
#[derive(Debug, Clone, Default)]
pub struct SynthesisRequest {
    pub tree: SourceTree,
    pub components: Vec<ComponentRequest>,
    pub dependencies: Vec<RawDependencySpec>,
    pub output_root: PathBuf,
}

impl SynthesisRequest {
    pub fn new(tree: SourceTree, output_root: impl Into<PathBuf>) -> Self {
        SynthesisRequest {
            tree,
            output_root: output_root.into(),
            ..Default::default()
        }
    }

    pub fn component(mut self, request: ComponentRequest) -> Self {
        self.components.push(request);
        self
    }

    pub fn dependencies(mut self, specs: Vec<RawDependencySpec>) -> Self {
        self.dependencies.extend(specs);
        self
    }
}

/// What a job hands back, complete or not.
///
/// Carries no job identity, so identical requests give equal results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub output_root: PathBuf,
    pub state: JobState,
    /// In request order.
    pub components: Vec<Component>,
    pub resolution: ResolutionResult,
    pub warnings: Vec<Warning>,
}

impl SynthesisResult {
    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// Why a job stopped before `Complete`.
enum Halt {
    Cancelled(&'static str),
    Build(String),
    Job(JobError),
}

impl From<JobError> for Halt {
    fn from(e: JobError) -> Self {
        Halt::Job(e)
    }
}

/// Partial results accumulated while a job runs.
struct JobRun {
    id: JobId,
    components: Vec<Component>,
    resolution: ResolutionResult,
    warnings: Vec<Warning>,
}

/// Drives synthesis jobs. Collaborators are fixed at construction.
pub struct Synthesizer {
    config: SynthesisConfig,
    oracle: Arc<dyn VersionOracle>,
    registry: Arc<JobRegistry>,
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig, oracle: Arc<dyn VersionOracle>) -> Self {
        Synthesizer {
            config,
            oracle,
            registry: Arc::new(JobRegistry::new()),
        }
    }

    /// Share a registry with other synthesizers or observers.
    pub fn with_registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Register a pending job to be driven later by [`Synthesizer::run_job`].
    pub fn submit(&self) -> JobId {
        self.registry.create()
    }

    /// Run one job to a terminal state and drop its record from the registry.
    /// Never fails: problems end up in `warnings`, structural failures in a
    /// `Failed` state with partial results.
    pub async fn run(&self, request: SynthesisRequest, cancel: CancellationToken) -> SynthesisResult {
        let id = self.submit();
        let result = self.run_job(id, request, cancel).await;
        self.registry.remove(id);
        result
    }

    /// Drive a job created by [`Synthesizer::submit`]. The terminal record stays
    /// in the registry until the caller removes it.
    pub async fn run_job(&self, id: JobId, request: SynthesisRequest, cancel: CancellationToken) -> SynthesisResult {
        let output_root = request.output_root.clone();
        let mut run = JobRun {
            id,
            components: Vec::new(),
            resolution: ResolutionResult::default(),
            warnings: Vec::new(),
        };
        info!("Starting job {} with {} components", run.id, request.components.len());

        let state = match self.drive(request, &cancel, &mut run).await {
            Ok(()) => JobState::Complete,
            Err(halt) => {
                let warning = match halt {
                    Halt::Cancelled(phase) => Warning::new(WarningKind::Cancelled, "job", format!("cancelled {phase}")),
                    Halt::Build(reason) => Warning::new(WarningKind::JobFailed, "job", reason),
                    Halt::Job(e) => Warning::new(WarningKind::JobFailed, "job", e.to_string()),
                };
                run.warnings.push(warning.logged());
                if let Err(e) = self.registry.transition(run.id, JobState::Failed) {
                    warn!("{}", e);
                }
                JobState::Failed
            }
        };

        info!(
            "Job {} finished {:?}: {} components, {} warnings",
            run.id,
            state,
            run.components.len(),
            run.warnings.len()
        );
        SynthesisResult {
            output_root,
            state,
            components: run.components,
            resolution: run.resolution,
            warnings: run.warnings,
        }
    }

    async fn drive(&self, request: SynthesisRequest, cancel: &CancellationToken, run: &mut JobRun) -> Result<(), Halt> {
        let SynthesisRequest {
            tree,
            components,
            dependencies,
            output_root,
        } = request;

        // ── Extraction ──────────────────────────────────────
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled("before extraction"));
        }
        self.registry.transition(run.id, JobState::ExtractingComponents)?;

        let build = tokio::task::spawn_blocking(move || build_tree(&tree))
            .await
            .map_err(|e| Halt::Build(format!("import graph build failed: {e}")))?;
        run.warnings.extend(build.warnings);
        info!(
            "Import graph: {} files, {} edges",
            build.graph.file_count(),
            build.graph.edge_count()
        );

        let graph = Arc::new(build.graph);
        let (extracted, interrupted) = self.extract_all(graph, &components, cancel).await;
        for component in &extracted {
            run.warnings.extend(component.warnings.iter().cloned());
        }
        run.components = extracted;
        if interrupted {
            return Err(Halt::Cancelled("during extraction"));
        }

        // ── Resolution ──────────────────────────────────────
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled("before dependency resolution"));
        }
        self.registry.transition(run.id, JobState::ResolvingDependencies)?;

        run.warnings.extend(undeclared_packages(&run.components, &dependencies));
        let resolved = resolve_specs(
            &dependencies,
            self.oracle.as_ref(),
            self.config.max_relaxation_attempts,
        )
        .await;
        run.resolution = resolved.result;
        run.warnings.extend(resolved.warnings);

        // ── Assembly ────────────────────────────────────────
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled("before assembly"));
        }
        self.registry.transition(run.id, JobState::Assembling)?;

        for component in run.components.iter_mut().filter(|c| !c.is_failed()) {
            match assemble::write_component(&output_root, component).await {
                Ok(written) => debug!("Assembled {} ({} files)", component.name, written),
                Err(e) => {
                    component.mark_failed(e.to_string());
                    run.warnings
                        .push(Warning::new(WarningKind::AssemblyFailed, &component.name, e.to_string()).logged());
                }
            }
        }
        if self.config.write_resolution_manifest {
            if let Err(e) = assemble::write_resolution(&output_root, &run.resolution).await {
                run.warnings.push(
                    Warning::new(WarningKind::AssemblyFailed, assemble::RESOLUTION_MANIFEST, e.to_string()).logged(),
                );
            }
        }

        self.registry.transition(run.id, JobState::Complete)?;
        Ok(())
    }

    async fn extract_all(
        &self,
        graph: Arc<ImportGraph>,
        requests: &[ComponentRequest],
        cancel: &CancellationToken,
    ) -> (Vec<Component>, bool) {
        let config = self.config.clone();
        let max_workers = config.max_workers;
        extract_pool(requests, max_workers, cancel, move |request| extract(request, &graph, &config)).await
    }
}

/// Run `extract_one` for every request on at most `max_workers` blocking tasks.
///
/// Results come back in request order. The flag reports whether cancellation
/// stopped scheduling early; tasks already running still finish and report.
pub(crate) async fn extract_pool<F>(
    requests: &[ComponentRequest],
    max_workers: usize,
    cancel: &CancellationToken,
    extract_one: F,
) -> (Vec<Component>, bool)
where
    F: Fn(&ComponentRequest) -> Component + Send + Sync + 'static,
{
    let extract_one = Arc::new(extract_one);
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Component)>();
    let mut handles = Vec::with_capacity(requests.len());
    let mut interrupted = false;

    for (index, request) in requests.iter().enumerate() {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        if cancel.is_cancelled() {
            info!("Cancellation observed, {} components not scheduled", requests.len() - index);
            interrupted = true;
            break;
        }

        let extract_one = Arc::clone(&extract_one);
        let tx = tx.clone();
        let owned = request.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let component = extract_one(&owned);
            drop(permit);
            if let Err(e) = tx.send((index, component)) {
                warn!("Failed to report component {}: {}", owned.name, e);
            }
        });
        handles.push((index, handle));
    }
    drop(tx);

    let mut slots: Vec<Option<Component>> = vec![None; requests.len()];
    for (index, handle) in handles {
        if let Err(e) = handle.await {
            let request = &requests[index];
            warn!("Extraction task for {} failed: {}", request.name, e);
            let mut component = Component::failed(request, format!("extraction task failed: {e}"));
            component.warnings.push(Warning::new(
                WarningKind::ComponentFailed,
                &request.name,
                format!("extraction task failed: {e}"),
            ));
            slots[index] = Some(component);
        }
    }
    while let Some((index, component)) = rx.recv().await {
        slots[index] = Some(component);
    }

    (slots.into_iter().flatten().collect(), interrupted)
}

/// Packages imported by extracted code that no source declares.
fn undeclared_packages(components: &[Component], dependencies: &[RawDependencySpec]) -> Vec<Warning> {
    let declared: BTreeSet<String> = dependencies
        .iter()
        .filter_map(|spec| normalize(spec).ok())
        .map(|d| d.name)
        .collect();

    let mut warnings = Vec::new();
    for component in components.iter().filter(|c| !c.is_failed()) {
        for package in &component.external_refs {
            if !declared.contains(&canonical_name(package)) {
                warnings.push(
                    Warning::new(
                        WarningKind::UndeclaredPackage,
                        package,
                        format!("imported by component `{}` but declared by no source", component.name),
                    )
                    .logged(),
                );
            }
        }
    }
    warnings
}
