use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vrc_lib::Viewport;

#[derive(Parser)]
#[command(name = "vrc")]
#[command(
    version,
    about = "Visual Regression Comparator - Compare production and migrated sites component by component",
    long_about = "Visual Regression Comparator (VRC)\n\nModes:\n- run: render every URL on both origins, diff header/body/footer regions and write JUnit + HTML reports.\n- report: rebuild reports from results persisted by earlier runs.\n- check-urls: preflight a URL list with HTTP GET and list invalid pages.\n- diff-urls: list entries present in only one of two URL lists.\n\nOrigins come from PROD_WEBSITE_URL and MIGRATED_WEBSITE_URL (or STAGE_WEBSITE_URL)."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for viewport/workers/timeouts/selectors; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare every URL in a list across both environments
    Run(RunArgs),

    /// Regenerate reports from persisted results
    Report(ReportArgs),

    /// Check that every URL in a list responds without an error status
    CheckUrls(CheckUrlsArgs),

    /// Compare two URL lists and report entries present in only one
    DiffUrls(DiffUrlsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, value_name = "PATH", help = "JSON array of relative paths or absolute URLs")]
    pub urls: PathBuf,

    #[arg(
        long,
        default_value = "1280x720",
        help = "Viewport dimensions (WIDTHxHEIGHT)"
    )]
    pub viewport: Viewport,

    #[arg(long, default_value = "4", help = "Number of browser workers")]
    pub workers: usize,

    #[arg(
        long,
        default_value = "150",
        help = "Hard limit (seconds) for comparing one page"
    )]
    pub task_timeout: u64,

    #[arg(
        long,
        default_value = "30",
        help = "Navigation timeout (seconds) for each side"
    )]
    pub nav_timeout: u64,

    #[arg(
        long,
        value_name = "PATH",
        help = "Known differences to suppress (.json, .yaml or .yml list of {url, component, percents})"
    )]
    pub ignore_list: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        help = "Directory for screenshots, diffs, results and reports (default .comparison_results)"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Skip writing report.html")]
    pub no_html: bool,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, value_name = "PATH", help = "Directory holding results/ from earlier runs")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Skip writing report.html")]
    pub no_html: bool,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CheckUrlsArgs {
    #[arg(long, value_name = "PATH", help = "JSON array of relative paths or absolute URLs")]
    pub urls: PathBuf,

    #[arg(long, value_enum, default_value = "migrated", help = "Environment to check")]
    pub side: SideArg,

    #[arg(long, default_value = "4", help = "Concurrent requests")]
    pub concurrency: usize,

    #[arg(long, default_value = "3", help = "Retries after an HTTP 502")]
    pub retries: u32,

    #[arg(
        long,
        default_value = "500",
        value_name = "MS",
        help = "Delay (milliseconds) between 502 retries"
    )]
    pub retry_delay: u64,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DiffUrlsArgs {
    #[arg(value_name = "LEFT", help = "First URL list (JSON array)")]
    pub left: PathBuf,

    #[arg(value_name = "RIGHT", help = "Second URL list (JSON array)")]
    pub right: PathBuf,

    #[arg(
        long,
        value_name = "PATH",
        default_value = "urls-diff.json",
        help = "Where to write the differences when any are found"
    )]
    pub write: PathBuf,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum SideArg {
    Prod,
    Migrated,
}

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
