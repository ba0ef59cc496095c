mod report;
mod run;
mod urls;

pub use report::run_report;
pub use run::run_compare;
pub use urls::{run_check_urls, run_diff_urls};
