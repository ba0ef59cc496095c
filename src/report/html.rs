//! Self-contained HTML page showing every compared region side by side.

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;

use super::{format_percent, Summary};
use crate::error::Result;
use crate::types::{ComponentResult, PageOutcome};

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; }
table { border-collapse: collapse; width: 100%; margin-bottom: 24px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; vertical-align: top; }
th { background-color: #f2f2f2; }
img { max-width: 300px; }
.fail { color: #b00020; }
.pass { color: #1b5e20; }
";

fn image_cell(path: Option<&PathBuf>) -> String {
    match path {
        Some(path) => {
            let src = path.display().to_string();
            format!("<a href=\"{0}\"><img src=\"{0}\" loading=\"lazy\"/></a>", escape(&src))
        }
        None => "&mdash;".to_string(),
    }
}

fn status_class(failing: bool) -> &'static str {
    if failing {
        "fail"
    } else {
        "pass"
    }
}

fn component_row(out: &mut String, component: &ComponentResult) {
    let _ = writeln!(
        out,
        "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        escape(&component.component),
        status_class(component.is_failure()),
        escape(component.tag.as_str()),
        format_percent(component.mismatch_percent),
        image_cell(component.prod_image.as_ref()),
        image_cell(component.migrated_image.as_ref()),
        image_cell(component.diff_image.as_ref()),
    );
}

fn page_section(out: &mut String, outcome: &PageOutcome) {
    let tag = outcome.overall_tag();
    let _ = writeln!(
        out,
        "<h2>{} <span class=\"{}\">{}</span></h2>",
        escape(outcome.url()),
        status_class(tag.is_failure()),
        escape(tag.as_str()),
    );
    match outcome {
        PageOutcome::Compared(page) => {
            let _ = writeln!(
                out,
                "<p>Overall mismatch: {}%</p>",
                format_percent(page.overall_mismatch)
            );
            out.push_str(
                "<table>\n<tr><th>Component</th><th>Tag</th><th>Mismatch %</th>\
                 <th>Production</th><th>Migrated</th><th>Difference</th></tr>\n",
            );
            for component in &page.components {
                component_row(out, component);
            }
            if let Some(full_page) = &page.full_page {
                component_row(out, full_page);
            }
            out.push_str("</table>\n");
        }
        PageOutcome::RedirectMismatch(redirect) => {
            let _ = writeln!(
                out,
                "<p>Production landed on <code>{}</code>, migrated landed on <code>{}</code>.</p>",
                escape(&redirect.prod_final_url),
                escape(&redirect.migrated_final_url),
            );
        }
        PageOutcome::Failed(failure) => {
            let _ = writeln!(out, "<p class=\"fail\">{}</p>", escape(&failure.reason));
        }
    }
}

pub fn render_report(outcomes: &[PageOutcome], summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n");
    out.push_str("<title>Visual Comparison Report</title>\n<style>\n");
    out.push_str(STYLE);
    out.push_str("</style>\n</head>\n<body>\n<h1>Visual Comparison Report</h1>\n");

    let _ = writeln!(
        out,
        "<p>{} pages: {} compared, {} redirect mismatches, {} failed. {} failing cases.</p>",
        summary.pages,
        summary.compared,
        summary.redirect_mismatches,
        summary.failed,
        summary.failing_cases,
    );
    out.push_str("<table>\n<tr><th>Suite</th><th>Tests</th><th>Failures</th></tr>\n");
    for suite in &summary.suites {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td></tr>",
            escape(&suite.name),
            suite.tests,
            status_class(suite.failures > 0),
            suite.failures,
        );
    }
    out.push_str("</table>\n");

    for outcome in outcomes {
        page_section(&mut out, outcome);
    }
    out.push_str("</body>\n</html>\n");
    out
}

pub fn write_report(path: &Path, outcomes: &[PageOutcome], summary: &Summary) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_report(outcomes, summary))?;
    Ok(())
}
