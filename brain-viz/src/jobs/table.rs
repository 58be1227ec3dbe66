//! 任务表.

use std::path::{Path, PathBuf};

use super::{default_output_dir, Job, JobOutcome};
use crate::ExportResult;

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use std::fs;
        use crate::ExportError;
    }
}

/// 一组按顺序执行的转换任务.
///
/// json 形如:
///
/// ```json
/// {
///   "output_dir": "output",
///   "jobs": [
///     { "kind": "volume", "path": "a.raw", "dims": [4, 4, 4], "stride": 2,
///       "dtype": "<u2", "mode": "raw", "threshold": 1, "output": { "token": "a" } },
///     { "kind": "streamlines", "path": "b.trk", "token": "b", "stride": 30, "min_length": 7 },
///     { "kind": "frame-stack", "path": "c.tif", "token": "c", "stride": 2 }
///   ]
/// }
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct JobTable {
    /// 生成文件名的输出目录.
    #[cfg_attr(feature = "serde", serde(default = "default_output_dir"))]
    pub output_dir: PathBuf,

    /// 源文件目录. 设置后, 相对源路径拼接到该目录下.
    #[cfg_attr(feature = "serde", serde(default))]
    pub input_dir: Option<PathBuf>,

    /// 任务列表.
    pub jobs: Vec<Job>,
}

impl JobTable {
    /// 以默认输出目录创建任务表.
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            output_dir: default_output_dir(),
            input_dir: None,
            jobs,
        }
    }

    /// 任务数.
    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// 是否没有任务.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 依次执行所有任务, 遇到第一个错误即停止.
    pub fn run_all(&self) -> ExportResult<Vec<JobOutcome>> {
        self.run_with(|_, _| {})
    }

    /// 依次执行所有任务, 每完成一个任务调用一次 `on_done(序号, 结果)`.
    pub fn run_with<F>(&self, mut on_done: F) -> ExportResult<Vec<JobOutcome>>
    where
        F: FnMut(usize, &JobOutcome),
    {
        let mut done = Vec::with_capacity(self.jobs.len());
        for (i, job) in self.jobs.iter().enumerate() {
            log::info!(
                "Job {}/{} ({}): {}",
                i + 1,
                self.jobs.len(),
                job.kind(),
                job.source().display()
            );
            let outcome = match &self.input_dir {
                Some(base) => job.rebased(base).run(&self.output_dir)?,
                None => job.run(&self.output_dir)?,
            };
            on_done(i, &outcome);
            done.push(outcome);
        }
        Ok(done)
    }

    /// 覆盖输出目录.
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 设置源文件目录.
    pub fn with_input_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.input_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

#[cfg(feature = "serde")]
impl JobTable {
    /// 从 json 字符串解析. `origin` 只用于错误信息.
    pub fn from_json(text: &str, origin: &Path) -> ExportResult<Self> {
        serde_json::from_str(text).map_err(|e| ExportError::JobTable {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// 读取 json 任务表.
    pub fn load<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ExportError::JobTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let table = Self::from_json(&text, path)?;
        log::info!("Loaded {} job(s) from {}", table.len(), path.display());
        Ok(table)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use crate::data::{ElemType, Endian, Layout, TrkSpace};
    use crate::jobs::{OutputName, StackJob, StreamlineJob, VolumeJob};
    use crate::sample::SampleMode;
    use crate::ExportError;

    #[test]
    fn test_parse_table() {
        let text = r#"{
            "jobs": [
                { "kind": "volume", "path": "a.raw", "dims": [545, 755, 760], "stride": 2,
                  "dtype": ">u2", "layout": "fortran", "mode": "andrix-raw", "threshold": 1,
                  "output": { "token": "corpus" } },
                { "kind": "volume", "path": "m.nii.gz", "dims": [10, 20, 30], "stride": 3,
                  "mode": "mask-dir", "output": { "path": "out/dir.txt" } },
                { "kind": "streamlines", "path": "b.trk", "token": "demyel",
                  "stride": 30, "min_length": 7, "space": "voxmm" },
                { "kind": "frame-stack", "path": "c.tif", "token": "vessels", "stride": 2 }
            ]
        }"#;
        let t = JobTable::from_json(text, Path::new("jobs.json")).unwrap();

        assert_eq!(t.output_dir, PathBuf::from("output"));
        assert_eq!(t.input_dir, None);
        assert_eq!(t.len(), 4);
        assert_eq!(
            t.jobs[0],
            Job::Volume(VolumeJob {
                path: "a.raw".into(),
                dims: [545, 755, 760],
                stride: 2,
                dtype: Some(ElemType::U16(Endian::Big)),
                layout: Layout::Fortran,
                mode: SampleMode::Raw,
                threshold: 1,
                output: OutputName::Token("corpus".into()),
            })
        );
        match &t.jobs[1] {
            Job::Volume(v) => {
                assert_eq!(v.dtype, None);
                assert_eq!(v.threshold, 0);
                assert_eq!(v.layout, Layout::C);
                assert_eq!(v.output_path(&t.output_dir), PathBuf::from("out/dir.txt"));
            }
            other => panic!("unexpected job {other:?}"),
        }
        assert_eq!(
            t.jobs[2],
            Job::Streamlines(StreamlineJob {
                path: "b.trk".into(),
                token: "demyel".into(),
                stride: 30,
                min_length: 7,
                dims_label: None,
                space: TrkSpace::VoxMm,
            })
        );
        assert_eq!(
            t.jobs[3],
            Job::FrameStack(StackJob {
                path: "c.tif".into(),
                token: "vessels".into(),
                stride: 2,
            })
        );
    }

    #[test]
    fn test_bad_mode_is_reported() {
        let text = r#"{ "jobs": [ { "kind": "volume", "path": "a.raw", "dims": [1, 1, 1],
            "stride": 1, "mode": "andrix-foo", "output": { "token": "a" } } ] }"#;
        let r = JobTable::from_json(text, Path::new("jobs.json"));
        assert!(matches!(r, Err(ExportError::JobTable { .. })));
    }

    #[test]
    fn test_missing_table_file() {
        let r = JobTable::load("/definitely/not/here/jobs.json");
        assert!(matches!(r, Err(ExportError::JobTable { .. })));
    }

    #[test]
    fn test_empty_table_runs() {
        let t = JobTable::new(Vec::new()).with_output_dir("elsewhere");
        assert!(t.is_empty());
        assert!(t.run_all().unwrap().is_empty());
    }
}
