use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vrc_lib::output::{RunOutput, VRC_OUTPUT_VERSION};
use vrc_lib::urls::load_url_list;
use vrc_lib::{
    write_reports, ArtifactLayout, Environments, IgnoreList, PipelineContext, PlaywrightRenderer,
    Scheduler, VrcOutput,
};

use crate::cli::RunArgs;
use crate::formatting::{finish, render_error};
use crate::settings::{format_effective_config, load_config, resolve_run_config, RunFlagSources};

/// Run the visual comparison over a URL list.
pub async fn run_compare(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    args: RunArgs,
) -> ExitCode {
    let format = args.out.format;
    let output = args.out.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let config = resolve_run_config(&args, config, &RunFlagSources::from_args(raw_args));
    if verbose {
        debug!("{}", format_effective_config(&config, config_path.as_deref()));
    }
    if let Err(err) = config.validate() {
        return render_error(err, format, output);
    }

    let env = match Environments::from_env() {
        Ok(env) => env,
        Err(err) => return render_error(err, format, output),
    };
    let pairs = match load_url_list(&args.urls).and_then(|entries| env.pairs(&entries)) {
        Ok(pairs) => pairs,
        Err(err) => return render_error(err, format, output),
    };
    let ignore = match &config.ignore_list {
        Some(path) => match IgnoreList::load(path) {
            Ok(list) => list,
            Err(err) => return render_error(err, format, output),
        },
        None => IgnoreList::default(),
    };
    info!(
        pages = pairs.len(),
        ignore_rules = ignore.len(),
        prod = %env.prod_origin,
        migrated = %env.migrated_origin,
        "starting comparison"
    );

    let renderer = PlaywrightRenderer::new(config.browser_options(env.migrated_headers.clone()));
    if !pairs.is_empty() {
        if let Err(err) = renderer.ensure_available().await {
            return render_error(err, format, output);
        }
    }

    let layout = ArtifactLayout::new(&config.output_dir);
    let ctx = Arc::new(PipelineContext {
        layout: layout.clone(),
        prod_origin: env.prod_origin.clone(),
        migrated_origin: env.migrated_origin.clone(),
        ignore,
        capture: config.capture_options(),
        diff: config.diff_options(),
        navigation_retry: config.retry_policy(),
    });

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling remaining pages");
            interrupt.cancel();
        }
    });

    let scheduler = Scheduler::new(
        Arc::new(renderer),
        ctx,
        config.scheduler_options(),
        cancel,
    );
    let run = scheduler.run(pairs).await;
    signal_task.abort();

    let summary = match write_reports(&layout, &run.outcomes, config.html_report) {
        Ok(summary) => summary,
        Err(err) => return render_error(err, format, output),
    };

    let body = VrcOutput::Run(RunOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        output_dir: config.output_dir.clone(),
        resumed: run.resumed,
        dispatched: run.dispatched,
        summary,
    });
    finish(&body, format, output)
}
