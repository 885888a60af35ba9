//! Unit tests for mosaic-orchestrator

use crate::orchestrator::extract_pool;
use crate::*;
use async_trait::async_trait;
use mosaic_core::{SourceFile, SourceTree, SynthesisConfig, WarningKind};
use mosaic_deps::{ConflictReason, RawDependencySpec, StaticOracle, Version, VersionOracle};
use mosaic_indexer::{Component, ComponentRequest, ComponentStatus};
use std::path::Path;
use std::sync::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn service_tree() -> SourceTree {
    SourceTree::new(vec![
        SourceFile::new("api/routes.py", "from core import db\nimport requests\n"),
        SourceFile::new("api/__init__.py", ""),
        SourceFile::new("core/__init__.py", ""),
        SourceFile::new("core/db.py", "from . import unused\nimport sqlalchemy\n"),
        SourceFile::new("core/unused.py", "X = 1\n"),
        SourceFile::new("README.md", "# service\n"),
    ])
}

fn specs() -> Vec<RawDependencySpec> {
    vec![
        RawDependencySpec::new("a", "requirements.txt", "requests>=2.0,<3.0", "pip"),
        RawDependencySpec::new("a", "requirements.txt", "SQLAlchemy>=1.4", "pip"),
        RawDependencySpec::new("b", "pyproject.toml", "requests>=2.5", "pip"),
    ]
}

fn oracle() -> Arc<dyn VersionOracle> {
    Arc::new(
        StaticOracle::new()
            .with_versions("requests", &["2.0.0", "2.5.0", "2.31.0", "3.0.0"])
            .unwrap()
            .with_versions("sqlalchemy", &["1.3.24", "1.4.52", "2.0.29"])
            .unwrap(),
    )
}

fn config() -> SynthesisConfig {
    SynthesisConfig {
        max_workers: 2,
        ..SynthesisConfig::default()
    }
}

fn request(output: &Path) -> SynthesisRequest {
    SynthesisRequest::new(service_tree(), output)
        .component(ComponentRequest::new("api", &["api/*"]))
        .component(ComponentRequest::new("ui", &["ui/*"]))
        .dependencies(specs())
}

#[tokio::test]
async fn test_full_job_completes() {
    let out = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(config(), oracle());
    let id = synthesizer.submit();
    assert_eq!(synthesizer.registry().state(id), Some(JobState::Pending));

    let result = synthesizer.run_job(id, request(out.path()), CancellationToken::new()).await;

    assert!(result.is_complete());
    assert_eq!(result.output_root, out.path());
    let names: Vec<&str> = result.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["api", "ui"]);

    let api = result.component("api").unwrap();
    assert_eq!(api.status, ComponentStatus::Assembled);
    let routes = std::fs::read_to_string(out.path().join("api/routes.py")).unwrap();
    assert_eq!(routes, "from core import db\nimport requests\n");
    assert!(out.path().join("api/core/db.py").exists());
    assert!(!out.path().join("api/README.md").exists());

    let ui = result.component("ui").unwrap();
    assert!(ui.files.is_empty());
    assert_eq!(result.warnings_of(WarningKind::EmptySeed).count(), 1);
    assert_eq!(result.warnings_of(WarningKind::UndeclaredPackage).count(), 0);

    assert!(result.resolution.is_complete());
    assert_eq!(result.resolution.get("requests").unwrap().version.to_string(), "2.31.0");
    assert_eq!(result.resolution.get("sqlalchemy").unwrap().version.to_string(), "2.0.29");

    let manifest = std::fs::read_to_string(out.path().join("resolution.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(parsed["resolved"][0]["package"], "requests");

    let record = synthesizer.registry().get(id).unwrap();
    assert_eq!(
        record.states(),
        vec![
            JobState::Pending,
            JobState::ExtractingComponents,
            JobState::ResolvingDependencies,
            JobState::Assembling,
            JobState::Complete,
        ]
    );
}

#[tokio::test]
async fn test_undeclared_imports_are_flagged() {
    let out = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(config(), oracle());
    let request = SynthesisRequest::new(service_tree(), out.path()).component(ComponentRequest::new("api", &["api/*"]));

    let result = synthesizer.run(request, CancellationToken::new()).await;

    assert!(result.is_complete());
    let subjects: Vec<&str> = result
        .warnings_of(WarningKind::UndeclaredPackage)
        .map(|w| w.subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["requests", "sqlalchemy"]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let out = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(config(), oracle());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let id = synthesizer.submit();
    let result = synthesizer.run_job(id, request(out.path()), cancel).await;

    assert_eq!(result.state, JobState::Failed);
    assert!(result.components.is_empty());
    assert_eq!(result.warnings_of(WarningKind::Cancelled).count(), 1);
    assert!(!out.path().join("resolution.json").exists());
    assert_eq!(
        synthesizer.registry().get(id).unwrap().states(),
        vec![JobState::Pending, JobState::Failed]
    );
}

#[tokio::test]
async fn test_unresolved_conflict_does_not_fail_job() {
    let out = tempfile::tempdir().unwrap();
    let oracle: Arc<dyn VersionOracle> = Arc::new(
        StaticOracle::new()
            .with_versions("numpy", &["1.19.0", "1.20.0"])
            .unwrap(),
    );
    let synthesizer = Synthesizer::new(config(), oracle);
    let request = SynthesisRequest::new(SourceTree::default(), out.path()).dependencies(vec![
        RawDependencySpec::new("a", "requirements.txt", "numpy==1.20", "pip"),
        RawDependencySpec::new("b", "requirements.txt", "numpy>=1.24", "pip"),
    ]);

    let result = synthesizer.run(request, CancellationToken::new()).await;

    assert!(result.is_complete());
    assert!(!result.resolution.is_complete());
    let conflict = result.resolution.conflict("numpy").unwrap();
    assert_eq!(conflict.reason, ConflictReason::EmptyIntersection);
    assert_eq!(conflict.declarations.len(), 2);
    assert_eq!(result.warnings_of(WarningKind::UnresolvedConflict).count(), 1);
}

#[tokio::test]
async fn test_assembly_failures_are_per_component() {
    let out = tempfile::tempdir().unwrap();
    // A plain file where the output directory should be
    let blocked = out.path().join("blocked");
    std::fs::write(&blocked, "").unwrap();

    let synthesizer = Synthesizer::new(config(), oracle());
    let request = SynthesisRequest::new(service_tree(), &blocked)
        .component(ComponentRequest::new("api", &["api/*"]))
        .dependencies(specs());

    let result = synthesizer.run(request, CancellationToken::new()).await;

    assert!(result.is_complete());
    assert!(result.component("api").unwrap().is_failed());
    let subjects: Vec<&str> = result
        .warnings_of(WarningKind::AssemblyFailed)
        .map(|w| w.subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["api", "resolution.json"]);
}

#[tokio::test]
async fn test_unsafe_component_name_is_not_written() {
    let out = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(config(), oracle());
    let request = SynthesisRequest::new(service_tree(), out.path().join("nested"))
        .component(ComponentRequest::new("../escape", &["core/db.py"]))
        .component(ComponentRequest::new("core", &["core/db.py"]));

    let result = synthesizer.run(request, CancellationToken::new()).await;

    assert!(result.is_complete());
    assert!(result.component("../escape").unwrap().is_failed());
    assert_eq!(result.component("core").unwrap().status, ComponentStatus::Assembled);
    assert!(!out.path().join("escape").exists());
}

#[tokio::test]
async fn test_runaway_component_fails_alone() {
    let out = tempfile::tempdir().unwrap();
    let config = SynthesisConfig {
        max_component_files: 2,
        ..config()
    };
    let synthesizer = Synthesizer::new(config, oracle());

    let result = synthesizer.run(request(out.path()), CancellationToken::new()).await;

    assert!(result.is_complete());
    assert!(result.component("api").unwrap().is_failed());
    assert!(!out.path().join("api").exists());
    assert_eq!(result.warnings_of(WarningKind::ComponentFailed).count(), 1);
}

#[tokio::test]
async fn test_components_keep_request_order() {
    let out = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(config(), oracle());
    let mut request = SynthesisRequest::new(service_tree(), out.path());
    let names: Vec<String> = (0..12).map(|i| format!("c{i:02}")).collect();
    for name in names.iter().rev() {
        request = request.component(ComponentRequest::new(name.as_str(), &["core/*.py"]));
    }

    let result = synthesizer.run(request, CancellationToken::new()).await;

    let got: Vec<&str> = result.components.iter().map(|c| c.name.as_str()).collect();
    let expected: Vec<&str> = names.iter().rev().map(String::as_str).collect();
    assert_eq!(got, expected);
    assert!(result.components.iter().all(|c| c.files.len() == 3));
}

#[tokio::test]
async fn test_same_job_gives_same_result() {
    let out = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let synthesizer = Synthesizer::new(config(), oracle()).with_registry(Arc::clone(&registry));

    let first = synthesizer.run(request(out.path()), CancellationToken::new()).await;
    let second = synthesizer.run(request(out.path()), CancellationToken::new()).await;

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_run_leaves_no_record_behind() {
    let out = tempfile::tempdir().unwrap();
    let synthesizer = Synthesizer::new(config(), oracle());

    for _ in 0..3 {
        synthesizer.run(request(out.path()), CancellationToken::new()).await;
    }
    assert!(synthesizer.registry().is_empty());

    // Submitted jobs stay until their owner removes them
    let id = synthesizer.submit();
    synthesizer.run_job(id, request(out.path()), CancellationToken::new()).await;
    assert_eq!(synthesizer.registry().len(), 1);
    assert!(synthesizer.registry().remove(id).is_some());
    assert!(synthesizer.registry().is_empty());
}

/// Answers like a static table but cancels the job on its first query.
struct CancellingOracle {
    inner: StaticOracle,
    cancel: CancellationToken,
    queried: Mutex<Vec<String>>,
}

#[async_trait]
impl VersionOracle for CancellingOracle {
    async fn available_versions(&self, package: &str) -> anyhow::Result<Vec<Version>> {
        self.cancel.cancel();
        self.queried.lock().unwrap().push(package.to_string());
        self.inner.available_versions(package).await
    }

    fn name(&self) -> &str {
        "cancelling"
    }
}

#[tokio::test]
async fn test_cancel_during_resolution_finishes_the_pass() {
    let out = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let oracle = Arc::new(CancellingOracle {
        inner: StaticOracle::new()
            .with_versions("requests", &["2.0.0", "2.5.0", "2.31.0", "3.0.0"])
            .unwrap()
            .with_versions("sqlalchemy", &["1.3.24", "1.4.52", "2.0.29"])
            .unwrap(),
        cancel: cancel.clone(),
        queried: Mutex::new(Vec::new()),
    });
    let synthesizer = Synthesizer::new(config(), oracle.clone());

    let id = synthesizer.submit();
    let result = synthesizer.run_job(id, request(out.path()), cancel).await;

    assert_eq!(result.state, JobState::Failed);
    // The resolver pass ran to the end despite the cancel on its first query
    assert_eq!(*oracle.queried.lock().unwrap(), vec!["requests", "sqlalchemy"]);
    assert!(result.resolution.is_complete());
    assert_eq!(result.resolution.get("requests").unwrap().version.to_string(), "2.31.0");
    assert_eq!(result.component("api").unwrap().status, ComponentStatus::Extracted);

    let cancelled: Vec<&str> = result
        .warnings_of(WarningKind::Cancelled)
        .map(|w| w.message.as_str())
        .collect();
    assert_eq!(cancelled, vec!["cancelled before assembly"]);
    assert!(!out.path().join("api").exists());
    assert!(!out.path().join("resolution.json").exists());
    assert_eq!(
        synthesizer.registry().get(id).unwrap().states(),
        vec![
            JobState::Pending,
            JobState::ExtractingComponents,
            JobState::ResolvingDependencies,
            JobState::Failed,
        ]
    );
}

#[tokio::test]
async fn test_cancel_during_extraction_stops_scheduling() {
    let cancel = CancellationToken::new();
    let requests: Vec<ComponentRequest> = (0..4)
        .map(|i| ComponentRequest::new(format!("c{i}"), &["*.py"]))
        .collect();
    let started = Arc::new(Mutex::new(Vec::new()));

    let on_extract = cancel.clone();
    let seen = Arc::clone(&started);
    let (components, interrupted) = extract_pool(&requests, 1, &cancel, move |request| {
        seen.lock().unwrap().push(request.name.clone());
        // Cancel while this task is in flight; it still reports
        on_extract.cancel();
        Component::failed(request, "stub")
    })
    .await;

    assert!(interrupted);
    assert_eq!(*started.lock().unwrap(), vec!["c0"]);
    let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["c0"]);
}

