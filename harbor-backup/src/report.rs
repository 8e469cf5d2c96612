//! Plain-text rendering of CLI action results.

use crate::executor::{RunOutcome, RunReport};
use crate::registry::models::{Artifact, HealthStatus, Project, Repository, Statistics};
use crate::resolver::ResolvedReferences;
use std::fmt::Write;

pub fn render_projects(projects: &[Project]) -> String {
    let mut out = String::new();
    for p in projects {
        let _ = writeln!(
            out,
            "{:>6}  {:<32} repos={}",
            p.id,
            p.name,
            p.repo_count.unwrap_or(0)
        );
    }
    let _ = writeln!(out, "{} projects", projects.len());
    out
}

pub fn render_repositories(repositories: &[Repository]) -> String {
    let mut out = String::new();
    for r in repositories {
        let _ = writeln!(
            out,
            "{:>6}  {:<48} artifacts={}",
            r.id,
            r.name,
            r.artifact_count.unwrap_or(0)
        );
    }
    let _ = writeln!(out, "{} repositories", repositories.len());
    out
}

pub fn render_artifacts(artifacts: &[Artifact]) -> String {
    let mut out = String::new();
    for a in artifacts {
        let kind = if a.is_multi_arch() {
            format!("index({})", a.references().len())
        } else {
            "image".to_string()
        };
        let _ = writeln!(out, "{:>6}  repo={:<6} {:<10} {}", a.id, a.repository_id, kind, a.digest);
    }
    let _ = writeln!(out, "{} artifacts", artifacts.len());
    out
}

pub fn render_statistics(stats: &Statistics) -> String {
    format!(
        "projects: {} total ({} private, {} public)\nrepositories: {} total ({} private, {} public)\n",
        stats.total_project_count,
        stats.private_project_count,
        stats.public_project_count,
        stats.total_repo_count,
        stats.private_repo_count,
        stats.public_repo_count,
    )
}

pub fn render_health(health: &HealthStatus) -> String {
    let mut out = format!("status: {}\n", health.status);
    for c in &health.components {
        let _ = writeln!(out, "  {:<20} {}", c.name, c.status);
    }
    out
}

fn section(out: &mut String, title: &str, items: &[String]) {
    let _ = writeln!(out, "== {} ({}) ==", title, items.len());
    for item in items {
        let _ = writeln!(out, "{}", item);
    }
}

/// Every resolver bucket, pullable set last.
pub fn render_uris(resolved: &ResolvedReferences) -> String {
    let mut out = String::new();
    section(&mut out, "single-arch", &resolved.single_arch);
    section(&mut out, "multi-arch", &resolved.multi_arch);
    section(&mut out, "multi-arch children", &resolved.multi_arch_children);
    section(&mut out, "unknown platform (excluded)", &resolved.unknown_platform);

    let pullable: Vec<String> = resolved.pullable.iter().cloned().collect();
    section(&mut out, "pullable", &pullable);
    out
}

pub fn render_run_report(report: &RunReport) -> String {
    let mut out = String::new();
    match report.outcome {
        RunOutcome::Completed => {
            let _ = writeln!(out, "{} backup: {}", report.kind, report.directory.display());
        }
        RunOutcome::NothingToDo => {
            let _ = writeln!(out, "{} backup", report.kind);
        }
    }
    let _ = writeln!(out, "started:  {}", report.started_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "finished: {}", report.finished_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "elapsed:  {:.2}s", report.elapsed.as_secs_f64());

    if report.outcome == RunOutcome::NothingToDo {
        let _ = writeln!(out, "nothing to back up: no new references since the last full backup");
        return out;
    }

    let _ = writeln!(
        out,
        "references: {} total, {} attempted, {} saved, {} failed",
        report.total,
        report.attempted,
        report.succeeded,
        report.failure_count()
    );
    for f in &report.failures {
        let _ = writeln!(out, "  FAILED {} ({}): {}", f.reference, f.stage, f.detail);
    }
    if report.is_clean() {
        let _ = writeln!(out, "backup completed successfully");
    } else {
        let _ = writeln!(out, "backup completed with failures");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::worker::{FailureStage, ItemFailure};
    use crate::executor::BackupKind;
    use chrono::Local;
    use std::path::PathBuf;
    use std::time::Duration;

    fn report(outcome: RunOutcome, failures: Vec<ItemFailure>) -> RunReport {
        RunReport {
            kind: BackupKind::Full,
            directory: PathBuf::from("artifacts/full_2024-05-01_10-00-00.000000001"),
            started_at: Local::now(),
            finished_at: Local::now(),
            elapsed: Duration::from_millis(1500),
            total: 3,
            attempted: 3,
            succeeded: 3 - failures.len(),
            failures,
            outcome,
        }
    }

    #[test]
    fn test_run_report_lists_failures() {
        let text = render_run_report(&report(
            RunOutcome::Completed,
            vec![ItemFailure {
                reference: "h/lib/app@sha256:bbb".into(),
                stage: FailureStage::Pull,
                detail: "manifest unknown".into(),
            }],
        ));

        assert!(text.contains("3 total, 3 attempted, 2 saved, 1 failed"));
        assert!(text.contains("FAILED h/lib/app@sha256:bbb (pull): manifest unknown"));
        assert!(text.contains("completed with failures"));
        assert!(text.contains("elapsed:  1.50s"));
    }

    #[test]
    fn test_nothing_to_do_is_distinct() {
        let text = render_run_report(&report(RunOutcome::NothingToDo, Vec::new()));
        assert!(text.contains("nothing to back up"));
        assert!(!text.contains("completed"));
        // The run directory of an empty delta is removed, so it is not shown
        assert!(text.starts_with("full backup\n"));
        assert!(!text.contains("full_2024-05-01"));
    }

    #[test]
    fn test_uris_sections() {
        let resolved = ResolvedReferences {
            pullable: ["h/lib/app@sha256:c1".to_string()].into_iter().collect(),
            single_arch: Vec::new(),
            multi_arch: vec!["h/lib/app@sha256:ccc".into()],
            multi_arch_children: vec![
                "h/lib/app@sha256:ccc::sha256:c1".into(),
                "h/lib/app@sha256:ccc::sha256:c2".into(),
            ],
            unknown_platform: vec!["h/lib/app@sha256:ccc::sha256:c2".into()],
        };

        let text = render_uris(&resolved);
        assert!(text.contains("== multi-arch children (2) =="));
        assert!(text.contains("== unknown platform (excluded) (1) =="));
        assert!(text.ends_with("== pullable (1) ==\nh/lib/app@sha256:c1\n"));
    }

    #[test]
    fn test_health() {
        let health: HealthStatus = serde_json::from_str(
            r#"{"status":"unhealthy","components":[{"name":"redis","status":"unhealthy"}]}"#,
        )
        .unwrap();
        let text = render_health(&health);
        assert!(text.starts_with("status: unhealthy\n"));
        assert!(text.contains("redis"));
    }
}
