//! 对 `brain-viz::jobs` 的更一层封装. 按环境变量或主目录约定定位任务表.

use brain_viz::dataset::home_dataset_dir_with;
use brain_viz::jobs::JobTable;
use brain_viz::{ExportError, ExportResult};
use std::env::{self, VarError};
use std::path::PathBuf;

/// 任务表路径的环境变量.
pub const JOBS_VAR: &str = "BRAIN_VIZ_JOBS";

/// 输出目录的环境变量.
pub const OUTPUT_DIR_VAR: &str = "BRAIN_VIZ_OUTPUT_DIR";

/// 非空的环境变量值.
fn non_empty(v: Result<String, VarError>) -> Option<PathBuf> {
    v.ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// 获取任务表路径.
///
/// 1. 若环境变量 `$BRAIN_VIZ_JOBS` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/brain-viz/jobs.json`.
pub fn jobs_file_from_env_or_home() -> Option<PathBuf> {
    non_empty(env::var(JOBS_VAR)).or_else(|| home_dataset_dir_with(["brain-viz", "jobs.json"]))
}

/// 获取 `$BRAIN_VIZ_OUTPUT_DIR`.
pub fn output_dir_from_env() -> Option<PathBuf> {
    non_empty(env::var(OUTPUT_DIR_VAR))
}

/// 加载任务表. `$BRAIN_VIZ_OUTPUT_DIR` 非空时覆盖表中的输出目录.
pub fn load_table<P: Into<PathBuf>>(path: P) -> ExportResult<JobTable> {
    let table = JobTable::load(path.into())?;
    Ok(match output_dir_from_env() {
        Some(d) => {
            log::info!("Output directory overridden by ${OUTPUT_DIR_VAR}: {}", d.display());
            table.with_output_dir(d)
        }
        None => table,
    })
}

/// 从 `$BRAIN_VIZ_JOBS` 或 `$HOME/dataset/brain-viz/jobs.json` 加载任务表.
pub fn table_from_env_or_home() -> ExportResult<JobTable> {
    let path = jobs_file_from_env_or_home().ok_or_else(|| ExportError::JobTable {
        path: PathBuf::from(format!("${JOBS_VAR}")),
        reason: "variable unset and no home directory found".to_string(),
    })?;
    load_table(path)
}
