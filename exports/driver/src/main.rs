//! 依次执行任务表中的全部转换.
//!
//! 用法: `driver [jobs.json]`. 未给出路径时读取 `$BRAIN_VIZ_JOBS`,
//! 再退回 `$HOME/dataset/brain-viz/jobs.json`.

use std::process::ExitCode;

mod result;
mod runner;

fn main() -> ExitCode {
    utils::init_logger();

    match runner::run(std::env::args_os().nth(1)) {
        Ok(r) => {
            r.analyze();
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
