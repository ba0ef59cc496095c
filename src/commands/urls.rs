use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{info, warn};
use vrc_lib::output::{CheckUrlsOutput, DiffUrlsOutput, VRC_OUTPUT_VERSION};
use vrc_lib::urls::{check_urls, diff_url_lists, load_url_list};
use vrc_lib::{Environments, VrcError, VrcOutput};

use crate::cli::{CheckUrlsArgs, DiffUrlsArgs, SideArg};
use crate::formatting::{finish, render_error};
use crate::settings::{load_config, resolve_check_urls_config, CheckUrlsFlagSources};

/// Request every URL of a list on one environment and report the invalid ones.
pub async fn run_check_urls(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    args: CheckUrlsArgs,
) -> ExitCode {
    let format = args.out.format;
    let output = args.out.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let config = resolve_check_urls_config(&args, config, &CheckUrlsFlagSources::from_args(raw_args));
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

    let (urls, headers): (Vec<String>, BTreeMap<String, String>) = match args.side {
        SideArg::Prod => (
            pairs.into_iter().map(|p| p.prod_url).collect(),
            BTreeMap::new(),
        ),
        SideArg::Migrated => (
            pairs.into_iter().map(|p| p.migrated_url).collect(),
            env.migrated_headers.clone(),
        ),
    };

    let checks = match check_urls(&urls, &headers, &config.url_check_options()).await {
        Ok(checks) => checks,
        Err(err) => return render_error(err, format, output),
    };
    let invalid: Vec<_> = checks.into_iter().filter(|check| !check.ok).collect();
    info!(checked = urls.len(), invalid = invalid.len(), "url check finished");

    let body = VrcOutput::CheckUrls(CheckUrlsOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        checked: urls.len(),
        invalid,
    });
    finish(&body, format, output)
}

/// Compare two URL lists, writing the differences when there are any.
pub async fn run_diff_urls(args: DiffUrlsArgs) -> ExitCode {
    let format = args.out.format;
    let output = args.out.output.clone();

    let lists = load_url_list(&args.left).and_then(|left| Ok((left, load_url_list(&args.right)?)));
    let (left, right) = match lists {
        Ok(lists) => lists,
        Err(err) => return render_error(err, format, output),
    };

    let differences = diff_url_lists(
        &left,
        &args.left.display().to_string(),
        &right,
        &args.right.display().to_string(),
    );

    let written = if differences.is_empty() {
        None
    } else {
        let content = match serde_json::to_string_pretty(&differences) {
            Ok(content) => content,
            Err(err) => return render_error(VrcError::from(err), format, output),
        };
        if let Err(err) = std::fs::write(&args.write, content) {
            return render_error(VrcError::from(err), format, output);
        }
        warn!(
            differences = differences.len(),
            path = %args.write.display(),
            "url lists differ"
        );
        Some(args.write.clone())
    };

    let body = VrcOutput::DiffUrls(DiffUrlsOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        differences,
        written,
    });
    finish(&body, format, output)
}
