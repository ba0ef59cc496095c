use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vrc_lib::output::VRC_OUTPUT_VERSION;
use vrc_lib::report::Summary;
use vrc_lib::{ErrorOutput, VrcError, VrcOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &VrcOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: VrcError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let error_payload = err.to_payload();
    let payload = VrcOutput::Error(ErrorOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Exit code 2 is reserved for fatal errors; failing pages use 1.
    ExitCode::from(2)
}

/// Write the output and map it to an exit code.
pub fn finish(body: &VrcOutput, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    if let Err(err) = write_output(body, format, output.clone()) {
        return render_error(VrcError::Unknown(err.to_string()), format, output);
    }
    exit_code_for(body.passed())
}

fn write_json_output(body: &VrcOutput, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &VrcOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_summary(buf: &mut String, summary: &Summary, colorize: bool) {
    let passed = summary.passed();
    let status = color(
        if passed { "PASS" } else { "FAIL" },
        if passed { "32" } else { "31" },
        colorize,
    );
    writeln!(
        buf,
        "{status} {} pages ({} compared, {} redirect mismatches, {} failed)",
        summary.pages, summary.compared, summary.redirect_mismatches, summary.failed
    )
    .ok();
    writeln!(buf, "Failing cases: {}", summary.failing_cases).ok();

    if !summary.suites.is_empty() {
        writeln!(buf, "Suites:").ok();
        for suite in &summary.suites {
            let failures = if suite.failures > 0 {
                color(&suite.failures.to_string(), "31", colorize)
            } else {
                suite.failures.to_string()
            };
            writeln!(buf, "- {:8} {} tests, {} failures", suite.name, suite.tests, failures).ok();
        }
    }
    if !summary.tags.is_empty() {
        writeln!(buf, "Tags:").ok();
        for (tag, count) in &summary.tags {
            writeln!(buf, "- {:16} {}", tag, count).ok();
        }
    }
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &VrcOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        VrcOutput::Run(out) => {
            let header = color("[RUN]", "36", colorize);
            writeln!(
                buf,
                "{} Visual regression run ({} rendered, {} resumed)",
                header, out.dispatched, out.resumed
            )
            .ok();
            write_summary(&mut buf, &out.summary, colorize);
            writeln!(buf, "Reports: {}", out.output_dir.display()).ok();
        }
        VrcOutput::Report(out) => {
            let header = color("[REPORT]", "36", colorize);
            writeln!(buf, "{} Reports rebuilt from {}", header, out.output_dir.display()).ok();
            write_summary(&mut buf, &out.summary, colorize);
        }
        VrcOutput::CheckUrls(out) => {
            let header = color("[CHECK]", "34", colorize);
            writeln!(
                buf,
                "{} {} URLs checked, {} invalid",
                header,
                out.checked,
                out.invalid.len()
            )
            .ok();
            for check in &out.invalid {
                let reason = check.reason.as_deref().unwrap_or("unknown");
                writeln!(buf, "- {} ({})", check.url, color(reason, "31", colorize)).ok();
            }
        }
        VrcOutput::DiffUrls(out) => {
            let header = color("[DIFF]", "34", colorize);
            if out.differences.is_empty() {
                writeln!(buf, "{} URL lists match", header).ok();
            } else {
                writeln!(buf, "{} {} differences", header, out.differences.len()).ok();
                for diff in &out.differences {
                    writeln!(buf, "- {:12} {}", diff.source, diff.url).ok();
                }
                if let Some(path) = &out.written {
                    writeln!(buf, "Written to {}", path.display()).ok();
                }
            }
        }
        VrcOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

pub fn exit_code_for(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
