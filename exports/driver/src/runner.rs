//! 程序运行函数.

use crate::result::ExportSummary;
use brain_viz::ExportResult;
use std::ffi::OsString;
use std::time::Instant;
use utils::loader;

/// 实际运行. `jobs_file` 为命令行给出的任务表路径.
pub fn run(jobs_file: Option<OsString>) -> ExportResult<ExportSummary> {
    let table = match jobs_file {
        Some(p) => loader::load_table(p)?,
        None => loader::table_from_env_or_home()?,
    };

    println!("Running {} export job(s)...", table.len());
    let start = Instant::now();
    let outcomes = table.run_with(|i, o| {
        log::info!(
            "Job {} done: {} record(s) -> {}",
            i + 1,
            o.records,
            o.output.display()
        );
    })?;

    Ok(ExportSummary::from_iter(
        table.jobs.iter().map(|j| j.kind()).zip(outcomes),
        start.elapsed(),
    ))
}
