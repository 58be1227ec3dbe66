//! 文本点云输出.
//!
//! 每个记录占一行, 字段以空格分隔. 第一个记录之前和最后一个记录之后都没有换行,
//! 相邻记录之间恰好一个 `\n`.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::consts::{FIELD_SEP, RECORD_SEP, TRK_COORD_SCALE};
use crate::data::Scalar;
use crate::{ExportError, ExportResult};

pub mod naming;

/// 点或线段后附带的额外字段.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Payload {
    /// 无额外字段. 输出行中连前导空格也不出现.
    #[default]
    Empty,

    /// 一个标量.
    Scalar(Scalar),

    /// 任意文本.
    Text(String),
}

impl Payload {
    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Scalar(_) => false,
            Self::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// 采样网格坐标上的点.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    /// x 坐标.
    pub x: usize,
    /// y 坐标.
    pub y: usize,
    /// z 坐标.
    pub z: usize,
    /// 额外字段.
    pub payload: Payload,
}

impl Point {
    /// 只有坐标的点.
    #[inline]
    pub fn coords(x: usize, y: usize, z: usize) -> Self {
        Self {
            x,
            y,
            z,
            payload: Payload::Empty,
        }
    }

    /// 带额外字段的点.
    #[inline]
    pub fn with(x: usize, y: usize, z: usize, payload: Payload) -> Self {
        Self { x, y, z, payload }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const S: char = FIELD_SEP;
        write!(f, "{}{S}{}{S}{}", self.x, self.y, self.z)?;
        if !self.payload.is_empty() {
            write!(f, "{S}{}", self.payload)?;
        }
        Ok(())
    }
}

/// 向零截断到一位小数: `trunc(10 * v) / 10`. `(-0.1, 0)` 内的负数得到 `-0.0`.
#[inline]
pub fn trunc_decimal(v: f32) -> f32 {
    (TRK_COORD_SCALE * v).trunc() / TRK_COORD_SCALE
}

/// 纤维上相邻两节点构成的线段. 端点坐标在构造时截断到一位小数.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    from: [f32; 3],
    to: [f32; 3],
    payload: String,
}

impl Segment {
    /// 由两个端点和额外字段构造. 端点坐标各自截断到一位小数.
    pub fn new(from: [f32; 3], to: [f32; 3], payload: String) -> Self {
        Self {
            from: from.map(trunc_decimal),
            to: to.map(trunc_decimal),
            payload,
        }
    }

    /// 截断后的起点.
    #[inline]
    pub fn start(&self) -> [f32; 3] {
        self.from
    }

    /// 截断后的终点.
    #[inline]
    pub fn end(&self) -> [f32; 3] {
        self.to
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const S: char = FIELD_SEP;
        let [x1, y1, z1] = self.from;
        let [x2, y2, z2] = self.to;
        // 截断后恰好剩一位小数.
        write!(
            f,
            "{x1:.1}{S}{y1:.1}{S}{z1:.1}{S}{x2:.1}{S}{y2:.1}{S}{z2:.1}{S}{}",
            self.payload
        )
    }
}

/// 只追加的文本记录输出.
///
/// 每个实例独立记录自己是否已写过记录, 多个转换互不影响.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    path: PathBuf,
    is_blank: bool,
    records: usize,
}

impl RecordWriter<BufWriter<File>> {
    /// 创建输出文件 (必要时创建其父目录). 已存在的文件会被覆盖.
    pub fn create<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| ExportError::output(path, e))?;
        }
        let file = File::create(path).map_err(|e| ExportError::output(path, e))?;
        Ok(Self::with_label(BufWriter::new(file), path))
    }
}

impl<W: Write> RecordWriter<W> {
    /// 包装任意输出. 错误信息中以 `<memory>` 指代该输出.
    #[inline]
    pub fn new(inner: W) -> Self {
        Self::with_label(inner, Path::new("<memory>"))
    }

    fn with_label(inner: W, path: &Path) -> Self {
        Self {
            inner,
            path: path.to_owned(),
            is_blank: true,
            records: 0,
        }
    }

    /// 输出路径 (或标签).
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 已写入的记录数.
    #[inline]
    pub fn records(&self) -> usize {
        self.records
    }

    /// 写入一个点: `x y z[ payload]`.
    #[inline]
    pub fn write_point(&mut self, p: &Point) -> ExportResult<()> {
        self.write_record(p)
    }

    /// 写入一条线段: `x1 y1 z1 x2 y2 z2 payload`.
    #[inline]
    pub fn write_segment(&mut self, s: &Segment) -> ExportResult<()> {
        self.write_record(s)
    }

    fn write_record(&mut self, record: &dyn fmt::Display) -> ExportResult<()> {
        self.try_write(record)
            .map_err(|e| ExportError::output(&self.path, e))
    }

    fn try_write(&mut self, record: &dyn fmt::Display) -> io::Result<()> {
        if self.is_blank {
            self.is_blank = false;
        } else {
            self.inner.write_all(RECORD_SEP)?;
        }
        write!(self.inner, "{record}")?;
        self.records += 1;
        Ok(())
    }

    /// 刷新并取回底层输出.
    pub fn finish(mut self) -> ExportResult<W> {
        self.inner
            .flush()
            .map_err(|e| ExportError::output(&self.path, e))?;
        Ok(self.inner)
    }
}
