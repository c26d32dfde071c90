use anyhow::Result;
use std::io::Write;

use super::summary::render_comparison;
use super::tables::format_duration;
use crate::config::OutputFormat;
use crate::regression::{ComparisonReport, ComparisonResult};

/// Writes a comparison report in the requested format.
///
/// - Human: the coloured terminal report
/// - Json: the serialised report, for scripts
/// - Markdown: a pull-request comment
pub fn export_report(
    report: &ComparisonReport,
    format: OutputFormat,
    pretty: bool,
    significance: f64,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Human => {
            writeln!(output, "{}", render_comparison(report, significance))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Markdown => export_markdown(report, output),
    }
}

fn export_json(report: &ComparisonReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_markdown(report: &ComparisonReport, output: &mut dyn Write) -> Result<()> {
    let regressions: Vec<&ComparisonResult> = report.regressions().collect();
    let improvements: Vec<&ComparisonResult> = report.improvements().collect();

    writeln!(output, "### ⏱ Job timings for build #{}", report.build)?;
    writeln!(output)?;
    writeln!(
        output,
        "Commit `{}` on `{}`, compared with {}.",
        report.commit,
        escape_markdown(&report.branch),
        report.baseline.describe()
    )?;
    writeln!(output)?;

    let headline = if regressions.is_empty() {
        "✅ **No significant regressions**".to_string()
    } else {
        format!("⚠️ **{} significant regression(s)**", regressions.len())
    };
    writeln!(
        output,
        "{headline} · {} improvement(s) · {} job(s) compared · threshold {:.1}%",
        improvements.len(),
        report.results.len(),
        report.threshold_percent
    )?;
    writeln!(output)?;

    let significant: Vec<&ComparisonResult> =
        regressions.into_iter().chain(improvements).collect();
    if !significant.is_empty() {
        write_table(output, &significant)?;
        writeln!(output)?;
    }

    if !report.results.is_empty() {
        writeln!(output, "<details>")?;
        writeln!(
            output,
            "<summary>All {} compared jobs</summary>",
            report.results.len()
        )?;
        writeln!(output)?;
        let all: Vec<&ComparisonResult> = report.results.iter().collect();
        write_table(output, &all)?;
        writeln!(output)?;
        writeln!(output, "</details>")?;
    }

    if !report.skipped.is_empty() {
        writeln!(output)?;
        writeln!(
            output,
            "_{} job(s) skipped (mechanical, failed, or too little history)._",
            report.skipped.len()
        )?;
    }

    Ok(())
}

fn write_table(output: &mut dyn Write, results: &[&ComparisonResult]) -> Result<()> {
    writeln!(output, "| Job | Current | Baseline | n | Change | p-value |")?;
    writeln!(output, "|---|---:|---:|---:|---:|---:|")?;
    for r in results {
        let marker = match (r.significant, r.regression) {
            (true, true) => "🔴 ",
            (true, false) => "🟢 ",
            _ => "",
        };
        writeln!(
            output,
            "| {} | {} | {} ± {} | {} | {marker}{:+.1}% | {:.3} |",
            escape_markdown(&r.job),
            format_duration(r.current),
            format_duration(r.baseline_mean),
            format_duration(r.baseline_std),
            r.baseline_n,
            r.percent_change,
            r.p_value
        )?;
    }
    Ok(())
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineScope;
    use crate::records::PipelineKind;
    use crate::regression::classify;

    fn report() -> ComparisonReport {
        ComparisonReport {
            build: 812,
            pipeline: PipelineKind::Trunk,
            branch: "pull/91/head".to_string(),
            commit: "abcdef12".to_string(),
            pull_request: Some(91),
            baseline: BaselineScope::MergeBase {
                commit: "1234567890abcdef".to_string(),
                ceiling: 800,
            },
            baseline_depth: 20,
            threshold_percent: 10.0,
            results: vec![
                classify("linux | test", 130.0, 100.0, 5.0, 20, 10.0, 0.05),
                classify("docs", 101.0, 100.0, 5.0, 20, 10.0, 0.05),
            ],
            skipped: Vec::new(),
        }
    }

    fn render(format: OutputFormat, report: &ComparisonReport) -> String {
        let mut buffer = Vec::new();
        export_report(report, format, false, 0.05, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_json_export_is_parseable() {
        let text = render(OutputFormat::Json, &report());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["build"], 812);
        assert_eq!(value["baseline"]["mode"], "merge_base");
        assert_eq!(value["baseline"]["ceiling"], 800);
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["results"][0]["regression"], true);
    }

    #[test]
    fn test_markdown_lists_significant_changes_and_full_table() {
        let text = render(OutputFormat::Markdown, &report());

        assert!(text.contains("build #812"));
        assert!(text.contains("1 significant regression(s)"));
        assert!(text.contains("linux \\| test"));
        assert!(text.contains("🔴 +30.0%"));
        assert!(text.contains("<details>"));
        assert!(text.contains("All 2 compared jobs"));
    }

    #[test]
    fn test_markdown_without_regressions() {
        let mut clean = report();
        clean.results.retain(|r| !r.significant);

        let text = render(OutputFormat::Markdown, &clean);

        assert!(text.contains("No significant regressions"));
        assert!(!text.contains("🔴"));
    }
}
