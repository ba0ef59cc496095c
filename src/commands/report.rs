use std::path::PathBuf;
use std::process::ExitCode;

use tracing::info;
use vrc_lib::output::{ReportOutput, VRC_OUTPUT_VERSION};
use vrc_lib::{write_reports, ArtifactLayout, ResultStore, VrcOutput};

use crate::cli::ReportArgs;
use crate::formatting::{finish, render_error};
use crate::settings::load_config;

/// Rebuild JUnit, HTML and summary files from persisted results.
pub async fn run_report(config_path: Option<PathBuf>, args: ReportArgs) -> ExitCode {
    let format = args.out.format;
    let output = args.out.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let output_dir = args.output_dir.clone().unwrap_or(config.output_dir);
    let html_report = config.html_report && !args.no_html;

    let layout = ArtifactLayout::new(&output_dir);
    let outcomes = match ResultStore::new(layout.clone()).load_all() {
        Ok(outcomes) => outcomes,
        Err(err) => return render_error(err, format, output),
    };
    info!(pages = outcomes.len(), dir = %output_dir.display(), "loaded persisted results");

    let summary = match write_reports(&layout, &outcomes, html_report) {
        Ok(summary) => summary,
        Err(err) => return render_error(err, format, output),
    };

    let body = VrcOutput::Report(ReportOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        output_dir,
        summary,
    });
    finish(&body, format, output)
}
