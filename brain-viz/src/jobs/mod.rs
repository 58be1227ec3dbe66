//! 转换任务.
//!
//! 每个任务描述一次完整的转换: 源文件, 采样参数和输出位置. 任务表 (`JobTable`)
//! 是一组按顺序执行的任务, 可以从 json 文件加载.
//!
//! 所有转换都先打开源文件, 成功后才创建输出文件.

use std::path::{Path, PathBuf};

use crate::consts::DEFAULT_OUTPUT_DIR;
use crate::dataset::resolve_under;
use crate::data::{AnyRawVolume, ElemType, FrameSource, Layout, MaskVolume, TiffStack, TrkReader, TrkSpace};
use crate::output::naming::{fibers_file_name, in_dir, stack_file_name, volume_file_name};
use crate::output::RecordWriter;
use crate::sample::{
    sample_stack, sample_streamlines, sample_volume, SampleMode, StreamlineReport, VolumeReport,
};
use crate::{ExportError, ExportResult, Idx3d};

mod table;

pub use table::JobTable;

/// 体数据任务的输出位置.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OutputName {
    /// 直接给出输出文件路径.
    Path(PathBuf),

    /// 在输出目录下按命名规则生成文件名, 该值为文件名中的数据集标记.
    Token(String),
}

/// raw / nii 体数据转换任务.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct VolumeJob {
    /// 源文件.
    pub path: PathBuf,

    /// 声明的形状 `[dimx, dimy, dimz]`.
    pub dims: [usize; 3],

    /// 三个方向共用的步长.
    pub stride: usize,

    /// raw 元素类型 (numpy dtype 字符串). 掩膜模式下忽略.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dtype: Option<ElemType>,

    /// raw 存储布局.
    #[cfg_attr(feature = "serde", serde(default))]
    pub layout: Layout,

    /// 采样模式.
    pub mode: SampleMode,

    /// 保留阈值.
    #[cfg_attr(feature = "serde", serde(default))]
    pub threshold: i64,

    /// 输出位置.
    pub output: OutputName,
}

impl VolumeJob {
    /// 声明的形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let [x, y, z] = self.dims;
        (x, y, z)
    }

    /// 输出文件路径.
    pub fn output_path(&self, out_dir: &Path) -> PathBuf {
        match &self.output {
            OutputName::Path(p) => p.clone(),
            OutputName::Token(t) => in_dir(
                out_dir,
                volume_file_name(t, self.shape(), self.stride, self.threshold),
            ),
        }
    }
}

/// trk 纤维束转换任务.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct StreamlineJob {
    /// 源文件.
    pub path: PathBuf,

    /// 文件名中的数据集标记.
    pub token: String,

    /// 纤维步长.
    pub stride: usize,

    /// 最少节点数 (含).
    pub min_length: usize,

    /// 文件名中的维度部分. 缺省时取 trk 文件头中的 `dim`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dims_label: Option<String>,

    /// 输出坐标所在空间.
    #[cfg_attr(feature = "serde", serde(default))]
    pub space: TrkSpace,
}

/// 多帧 tiff 图像栈转换任务.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct StackJob {
    /// 源文件.
    pub path: PathBuf,

    /// 文件名中的数据集标记.
    pub token: String,

    /// 三个方向共用的步长.
    pub stride: usize,
}

/// 一次转换任务.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "kebab-case"))]
pub enum Job {
    /// raw / nii 体数据.
    Volume(VolumeJob),

    /// trk 纤维束.
    Streamlines(StreamlineJob),

    /// 多帧 tiff 图像栈.
    FrameStack(StackJob),
}

/// 单个任务的统计结果.
#[derive(Clone, Debug, PartialEq)]
pub enum JobReport {
    /// 体数据.
    Volume(VolumeReport),

    /// 纤维束.
    Streamlines(StreamlineReport),

    /// 图像栈: 占据立方体形状, 解码帧数, 写出点数.
    FrameStack {
        /// 占据立方体形状.
        cuboid_shape: Idx3d,
        /// 解码帧数.
        frames_read: usize,
        /// 写出点数.
        retained: usize,
    },
}

/// 完成的任务.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutcome {
    /// 输出文件.
    pub output: PathBuf,

    /// 写出的记录数.
    pub records: usize,

    /// 统计结果.
    pub report: JobReport,
}

impl Job {
    /// 源文件路径.
    pub fn source(&self) -> &Path {
        match self {
            Self::Volume(j) => &j.path,
            Self::Streamlines(j) => &j.path,
            Self::FrameStack(j) => &j.path,
        }
    }

    /// 任务种类.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Volume(_) => "volume",
            Self::Streamlines(_) => "streamlines",
            Self::FrameStack(_) => "frame-stack",
        }
    }

    /// 将相对源路径拼接到 `base` 下.
    pub fn rebased(&self, base: &Path) -> Job {
        let mut job = self.clone();
        let path = match &mut job {
            Self::Volume(j) => &mut j.path,
            Self::Streamlines(j) => &mut j.path,
            Self::FrameStack(j) => &mut j.path,
        };
        *path = resolve_under(base, &*path);
        job
    }

    /// 执行任务. 生成的文件名放在 `out_dir` 下.
    pub fn run(&self, out_dir: &Path) -> ExportResult<JobOutcome> {
        match self {
            Self::Volume(j) => convert_volume(j, out_dir),
            Self::Streamlines(j) => convert_streamlines(j, out_dir),
            Self::FrameStack(j) => convert_frame_stack(j, out_dir),
        }
    }
}

/// 转换 raw 体数据或 nii 掩膜.
///
/// 掩膜模式 (`mask`, `mask-dir`) 读取 nii 文件, 其余模式按 `dtype` 读取 raw 文件.
pub fn convert_volume(job: &VolumeJob, out_dir: &Path) -> ExportResult<JobOutcome> {
    if job.stride == 0 {
        return Err(ExportError::InvalidStride);
    }
    let dims = job.shape();
    let output = job.output_path(out_dir);

    let (report, records) = if job.mode.reads_mask() {
        let vol = MaskVolume::open_expect(&job.path, dims)?;
        let mut out = RecordWriter::create(&output)?;
        let r = sample_volume(&vol, job.stride, job.mode, job.threshold, &mut out)?;
        let n = out.records();
        out.finish()?;
        (r, n)
    } else {
        let elem = job.dtype.ok_or_else(|| {
            ExportError::UnsupportedElementType(format!(
                "no dtype given for raw source {}",
                job.path.display()
            ))
        })?;
        let vol = AnyRawVolume::open(&job.path, dims, elem, job.layout)?;
        let mut out = RecordWriter::create(&output)?;
        let r = sample_volume(&vol, job.stride, job.mode, job.threshold, &mut out)?;
        let n = out.records();
        out.finish()?;
        (r, n)
    };

    Ok(JobOutcome {
        output,
        records,
        report: JobReport::Volume(report),
    })
}

/// 转换 trk 纤维束. 输出到
/// `{out_dir}/aa-fibers-{token}-{dims}-1-in-{stride}-thresh-{min_length}.txt`.
pub fn convert_streamlines(job: &StreamlineJob, out_dir: &Path) -> ExportResult<JobOutcome> {
    if job.stride == 0 {
        return Err(ExportError::InvalidStride);
    }
    let trk = TrkReader::open(&job.path, job.space)?;
    let label = match &job.dims_label {
        Some(l) => l.clone(),
        None => trk.header().dims_label(),
    };
    let output = in_dir(
        out_dir,
        fibers_file_name(&job.token, &label, job.stride, job.min_length),
    );

    let mut out = RecordWriter::create(&output)?;
    let report = sample_streamlines(trk, job.stride, job.min_length, &mut out)?;
    let records = out.records();
    out.finish()?;

    Ok(JobOutcome {
        output,
        records,
        report: JobReport::Streamlines(report),
    })
}

/// 转换多帧 tiff 图像栈. 输出到 `{out_dir}/aa-{token}-{w}x{h}x{d}-1-in-{stride}.txt`.
pub fn convert_frame_stack(job: &StackJob, out_dir: &Path) -> ExportResult<JobOutcome> {
    if job.stride == 0 {
        return Err(ExportError::InvalidStride);
    }
    let mut stack = TiffStack::open(&job.path)?;
    let output = in_dir(
        out_dir,
        stack_file_name(&job.token, stack.frame_shape(), stack.depth(), job.stride),
    );

    let mut out = RecordWriter::create(&output)?;
    let report = sample_stack(&mut stack, job.stride, &mut out)?;
    let records = out.records();
    out.finish()?;

    Ok(JobOutcome {
        output,
        records,
        report: JobReport::FrameStack {
            cuboid_shape: report.cuboid_shape(),
            frames_read: report.frames_read,
            retained: report.retained,
        },
    })
}

/// 默认输出目录.
#[inline]
pub fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}
