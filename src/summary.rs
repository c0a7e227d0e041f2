use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::load::{LoadReport, Work};

/// Writes the markdown phase summary plus a JSON sidecar with the same
/// rows for machine consumption.
pub struct SummaryWriter {
    path: PathBuf,
}

impl SummaryWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sidecar_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.json", self.path.display()))
    }

    pub fn write(&self, report: &LoadReport) -> Result<()> {
        let markdown = render_markdown(report);
        std::fs::write(&self.path, markdown)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        let sidecar = self.sidecar_path();
        std::fs::write(&sidecar, json)
            .with_context(|| format!("Failed to write {}", sidecar.display()))?;

        info!(path = %self.path.display(), "Summary written");
        Ok(())
    }
}

/// Render the report as a markdown document with a phase table and a
/// totals row.
pub fn render_markdown(report: &LoadReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Load test summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Mode: `{}`", report.mode);
    let _ = writeln!(out, "- Run id: `{}`", report.run_id);
    let _ = writeln!(out, "- Server: `{}`", report.server_address);
    let _ = writeln!(out, "- Namespace: `{}`", report.namespace);
    let _ = writeln!(out, "- Started: {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "| Phase | Scenario | Iterations | Concurrency | Duration | Workflows | Notes |"
    );
    let _ = writeln!(out, "|---|---|---|---|---|---|---|");

    for phase in &report.phases {
        let iterations = match phase.work {
            Work::Iterations(n) => n.to_string(),
            Work::Duration(secs) => format!("n/a ({} target)", format_duration(secs as f64)),
        };
        let workflows = phase
            .workflows
            .map_or_else(|| "n/a".to_string(), |n| n.to_string());

        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            phase.phase,
            phase.scenario,
            iterations,
            phase.concurrency,
            format_duration(phase.elapsed_secs),
            workflows,
            phase.note,
        );
    }

    let _ = writeln!(
        out,
        "| **Total** | | | | {} | {} | |",
        format_duration(report.total_elapsed_secs()),
        report.total_workflows(),
    );

    if let Some(failure) = &report.failure {
        let _ = writeln!(out);
        let _ = writeln!(out, "**Run aborted**: {failure}");
    }

    out
}

/// Compact duration rendering: `42.1s`, `3m12s`, `1h02m`.
fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }
    let total = secs.round() as u64;
    if total < 3600 {
        format!("{}m{:02}s", total / 60, total % 60)
    } else {
        format!("{}h{:02}m", total / 3600, (total % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{Mode, PhaseResult};
    use chrono::Utc;

    fn report_from_plan(mode: Mode) -> LoadReport {
        let phases = mode
            .phases()
            .iter()
            .enumerate()
            .map(|(idx, spec)| PhaseResult {
                phase: idx + 1,
                scenario: spec.scenario.cli_name().to_string(),
                work: spec.work,
                concurrency: spec.concurrency,
                elapsed_secs: 12.5,
                workflows: spec.derived_workflows(),
                note: spec.note.to_string(),
            })
            .collect();

        LoadReport {
            mode,
            run_id: format!("{mode}-20250101-000000-abcd"),
            server_address: "localhost:7233".to_string(),
            namespace: "temporal-mongodb".to_string(),
            started_at: Utc::now(),
            phases,
            failure: None,
        }
    }

    #[test]
    fn test_standard_total_equals_sum_of_phases() {
        let report = report_from_plan(Mode::Standard);
        let expected: u64 = report.phases.iter().filter_map(|p| p.workflows).sum();
        assert_eq!(report.total_workflows(), expected);
        // 500*1 + 200*6 + 300*1
        assert_eq!(report.total_workflows(), 2000);

        let markdown = render_markdown(&report);
        assert!(markdown.contains("| **Total** |"));
        assert!(markdown.contains("| 2000 |"));
    }

    #[test]
    fn test_soak_phases_render_na_workflows() {
        let report = report_from_plan(Mode::Nightly);
        let markdown = render_markdown(&report);
        assert!(markdown.contains("n/a"));
        assert_eq!(report.total_workflows(), 0);
    }

    #[test]
    fn test_failure_note_is_rendered() {
        let mut report = report_from_plan(Mode::Quick);
        report.failure = Some("phase 1: exit status 1".to_string());
        let markdown = render_markdown(&report);
        assert!(markdown.contains("**Run aborted**"));
    }

    #[test]
    fn test_format_duration_brackets() {
        assert_eq!(format_duration(42.13), "42.1s");
        assert_eq!(format_duration(192.0), "3m12s");
        assert_eq!(format_duration(3720.0), "1h02m");
    }

    #[test]
    fn test_writer_emits_markdown_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        let writer = SummaryWriter::new(&path);

        writer.write(&report_from_plan(Mode::Quick)).unwrap();

        assert!(path.exists());
        let sidecar = writer.sidecar_path();
        assert!(sidecar.exists());

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
        assert_eq!(parsed["mode"], "quick");
        assert_eq!(parsed["phases"].as_array().unwrap().len(), 1);
    }
}
