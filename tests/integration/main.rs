//! Integration tests for Mosaic
//!
//! These tests drive the binary and the library end to end over a tree on disk.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const JOB: &str = r#"
source = "repo"
output = "out"

[[components]]
name = "api"
seed_patterns = ["api/*"]

[[components]]
name = "web"
seed_patterns = ["web/app/*"]

[[dependencies]]
source_id = "service-a"
manifest_path = "requirements.txt"
raw_string = "requests>=2.0,<3.0"
format_tag = "pip"

[[dependencies]]
source_id = "service-a"
manifest_path = "requirements.txt"
raw_string = "SQLAlchemy>=1.4"
format_tag = "pip"

[[dependencies]]
source_id = "service-b"
manifest_path = "pyproject.toml"
raw_string = "requests>=2.5"
format_tag = "pip"

[[dependencies]]
source_id = "frontend"
manifest_path = "package.json"
raw_string = "react@^18.2.0"
format_tag = "npm"

[versions]
requests = ["2.0.0", "2.5.0", "2.31.0", "3.0.0"]
sqlalchemy = ["1.3.24", "1.4.52", "2.0.29"]
react = ["17.0.2", "18.2.0", "18.3.1"]
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    write(&repo, "api/routes.py", "from core import db\nimport requests\n");
    write(&repo, "api/__init__.py", "");
    write(&repo, "core/__init__.py", "");
    write(&repo, "core/db.py", "from . import unused\nimport sqlalchemy\n");
    write(&repo, "core/unused.py", "X = 1\n");
    write(&repo, "web/app/main.ts", "import { h } from '../lib/h';\nimport React from 'react';\n");
    write(&repo, "web/lib/h.ts", "export const h = 1;\n");
    write(dir.path(), "job.toml", JOB);
    dir
}

fn mosaic(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mosaic"))
        .args(args)
        .output()
        .expect("failed to run mosaic")
}

#[test]
fn test_cli_invocation() {
    let output = mosaic(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Extract self-contained components and merge their dependencies"));
}

#[test]
fn test_cli_synthesize_job() {
    let dir = fixture();
    let job = dir.path().join("job.toml");
    let output = mosaic(&["synthesize", "--job", job.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["state"], "complete");
    assert_eq!(result["components"][0]["name"], "api");
    assert_eq!(result["components"][1]["status"]["status"], "assembled");
    assert_eq!(result["warnings"], serde_json::json!([]));

    let out = dir.path().join("out");
    let main = std::fs::read_to_string(out.join("web/main.ts")).unwrap();
    assert_eq!(main, "import { h } from './web/lib/h';\nimport React from 'react';\n");
    assert!(out.join("web/web/lib/h.ts").exists());
    assert!(out.join("api/routes.py").exists());
    assert!(out.join("api/core/unused.py").exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("resolution.json")).unwrap()).unwrap();
    let resolved: Vec<(String, String)> = manifest["resolved"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["package"].as_str().unwrap().to_string(),
                r["version"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        resolved,
        vec![
            ("requests".to_string(), "2.31.0".to_string()),
            ("sqlalchemy".to_string(), "2.0.29".to_string()),
            ("react".to_string(), "18.3.1".to_string()),
        ]
    );
}

#[test]
fn test_cli_output_override() {
    let dir = fixture();
    let job = dir.path().join("job.toml");
    let elsewhere = dir.path().join("elsewhere");
    let output = mosaic(&[
        "synthesize",
        "--job",
        job.to_str().unwrap(),
        "--output",
        elsewhere.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert!(elsewhere.join("resolution.json").exists());
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_cli_scan() {
    let dir = fixture();
    let repo = dir.path().join("repo");
    let output = mosaic(&["scan", repo.to_str().unwrap()]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("files:    7"));
    assert!(stdout.contains("packages: 3"));
    assert!(stdout.contains("  react\n  requests\n  sqlalchemy\n"));
}

#[test]
fn test_cli_scan_lists_only_installed_packages() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.py", "\"\"\"Run with:\nimport devtools\n\"\"\"\nfrom core import db\nimport flask\n");
    write(dir.path(), "core/db.py", "");

    let output = mosaic(&["scan", dir.path().to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("edges:    2"));
    assert!(stdout.ends_with("packages: 1\n  flask\n"), "{stdout}");
}

#[test]
fn test_cli_missing_job_fails() {
    let output = mosaic(&["synthesize", "--job", "/nonexistent/job.toml"]);
    assert!(!output.status.success());
}

/// Conflicting pins settle through relaxation when the library is used directly
#[tokio::test]
async fn test_relaxation_through_synthesizer() {
    use mosaic_core::{SourceTree, SynthesisConfig};
    use mosaic_deps::{RawDependencySpec, RelaxationOutcome, Severity, StaticOracle};
    use mosaic_orchestrator::{JobState, SynthesisRequest, Synthesizer};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    let dir = TempDir::new().unwrap();
    let oracle = StaticOracle::new()
        .with_versions("numpy", &["1.20.0", "1.24.0", "1.26.4"])
        .unwrap();
    let synthesizer = Synthesizer::new(SynthesisConfig::default(), Arc::new(oracle));
    let request = SynthesisRequest::new(SourceTree::default(), dir.path()).dependencies(vec![
        RawDependencySpec::new("a", "requirements.txt", "numpy==1.20", "pip"),
        RawDependencySpec::new("b", "requirements.txt", "numpy>=1.24", "pip"),
    ]);

    let result = synthesizer.run(request, CancellationToken::new()).await;

    assert_eq!(result.state, JobState::Complete);
    let numpy = result.resolution.get("numpy").unwrap();
    assert_eq!(numpy.version.to_string(), "1.26.4");
    assert_eq!(numpy.relaxed_from.as_ref().unwrap().severity, Severity::Resolvable);
    assert_eq!(result.resolution.relaxation_log[0].outcome, RelaxationOutcome::Resolved);

    let manifest = std::fs::read_to_string(dir.path().join("resolution.json")).unwrap();
    assert!(manifest.contains("\"relaxation_log\""));
}
