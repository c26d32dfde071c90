use std::fmt::Write;
use std::path::PathBuf;

use comfy_table::{Cell, Color as TableColor};

use super::styling::{figure, good, heading, label, regression_count, value};
use super::tables::{
    color_coded_change_cell, color_coded_p_value_cell, create_cyan_header, create_table,
    format_duration,
};
use crate::records::PipelineKind;
use crate::regression::{ComparisonReport, SkipReason};

/// What `collect` did for one pipeline.
#[derive(Debug)]
pub struct PipelineCollect {
    pub pipeline: PipelineKind,
    pub slug: String,
    pub threshold: Option<u64>,
    pub builds: usize,
    pub pages: usize,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct CollectSummary {
    pub pipelines: Vec<PipelineCollect>,
    pub jobs: usize,
    pub written: bool,
    pub path: PathBuf,
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", heading(emoji), heading(title).underlined());
}

/// Prints the outcome of a `collect` run to stdout.
pub fn print_collect_summary(summary: &CollectSummary) {
    println!("{}", render_collect_summary(summary));
}

fn render_collect_summary(summary: &CollectSummary) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "📥", "Collection");

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Pipeline", "Slug", "Captured below", "Pages", "Builds", "Status",
    ]));

    for p in &summary.pipelines {
        let status = match &p.error {
            Some(e) => Cell::new(format!("partial: {e}")).fg(TableColor::Yellow),
            None => Cell::new("ok").fg(TableColor::Green),
        };
        table.add_row(vec![
            Cell::new(p.pipeline),
            Cell::new(&p.slug),
            Cell::new(p.threshold.map_or_else(|| "-".to_string(), |t| format!("#{t}"))),
            Cell::new(p.pages),
            Cell::new(p.builds),
            status,
        ]);
    }

    let _ = writeln!(output, "{table}\n");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {} {}",
        label("Jobs tracked:"),
        figure(summary.jobs),
        label("History file:"),
        value(summary.path.display()),
        if summary.written {
            good("(updated)")
        } else {
            label("(unchanged)")
        }
    );
    output
}

/// Human-readable comparison report.
///
/// Color coding:
/// - Red: significant regression
/// - Green: significant improvement
/// - Grey: within noise or below the threshold
pub(super) fn render_comparison(report: &ComparisonReport, significance: f64) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}",
        label("Build:"),
        value(format!("#{} ({})", report.build, report.pipeline)),
        label("Branch:"),
        value(&report.branch),
        label("Commit:"),
        value(&report.commit),
    );
    if let Some(pr) = report.pull_request {
        let _ = writeln!(output, "  {} {}", label("Pull request:"), value(format!("#{pr}")));
    }
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n",
        label("Baseline:"),
        figure(format!(
            "{} (up to {} builds)",
            report.baseline.describe(),
            report.baseline_depth
        )),
        label("Threshold:"),
        figure(format!("{:.1}%", report.threshold_percent)),
    );

    let regressions = report.regressions().count();
    let improvements = report.improvements().count();

    add_section_header(&mut output, "🧪", "Verdict");
    let verdict = regression_count(regressions);
    let _ = writeln!(
        output,
        "  {verdict}, {} improvement(s), {} job(s) compared\n",
        good(improvements),
        figure(report.results.len())
    );

    if report.results.is_empty() {
        let _ = writeln!(output, "{}", figure("No jobs had enough baseline data."));
    } else {
        add_section_header(&mut output, "⏱", "Job Durations");
        let mut table = create_table();
        table.set_header(create_cyan_header(&[
            "Job", "Current", "Baseline", "n", "Change", "p-value",
        ]));
        for r in &report.results {
            table.add_row(vec![
                Cell::new(&r.job),
                Cell::new(format_duration(r.current)),
                Cell::new(format!(
                    "{} ± {}",
                    format_duration(r.baseline_mean),
                    format_duration(r.baseline_std)
                )),
                Cell::new(r.baseline_n),
                color_coded_change_cell(r.percent_change, r.significant),
                color_coded_p_value_cell(r.p_value, significance),
            ]);
        }
        let _ = writeln!(output, "{table}");
    }

    let insufficient = report
        .skipped
        .iter()
        .filter(|s| s.reason == SkipReason::InsufficientBaseline)
        .count();
    if !report.skipped.is_empty() {
        let _ = writeln!(
            output,
            "\n  {}",
            label(format!(
                "Skipped {} job(s), {insufficient} for lack of baseline data",
                report.skipped.len()
            ))
        );
    }

    output
}
