//! 运行时错误.
//!
//! 所有错误都是致命的: 转换立即终止, 不做重试, 也不保留部分结果.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::Idx3d;

/// 转换过程中的错误.
#[derive(Debug)]
pub enum ExportError {
    /// 源文件不存在.
    SourceNotFound {
        /// 源文件路径.
        path: PathBuf,
    },

    /// 源文件存在, 但读取失败 (或内容被截断).
    Unreadable {
        /// 源文件路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: io::Error,
    },

    /// nifti 解码错误.
    Nifti {
        /// 源文件路径.
        path: PathBuf,
        /// 底层解码错误.
        source: nifti::NiftiError,
    },

    /// tiff 解码错误.
    Tiff {
        /// 源文件路径.
        path: PathBuf,
        /// 底层解码错误.
        source: tiff::TiffError,
    },

    /// trk 文件内容不符合格式.
    MalformedTrk {
        /// 源文件路径.
        path: PathBuf,
        /// 具体原因.
        reason: String,
    },

    /// 不支持的元素类型 (字节宽度, 字节序或 dtype 字符串).
    UnsupportedElementType(String),

    /// 解码后的数据形状与声明的形状不一致.
    DimensionMismatch {
        /// 源文件路径.
        path: PathBuf,
        /// 声明的形状 (或元素个数).
        expected: Vec<usize>,
        /// 实际的形状 (或元素个数).
        actual: Vec<usize>,
    },

    /// 输出文件无法创建或写入.
    OutputWrite {
        /// 输出文件路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: io::Error,
    },

    /// 步长必须至少为 1.
    InvalidStride,

    /// 未知的采样模式标签.
    UnknownMode(String),

    /// 采样模式与数据源不匹配 (例如对 raw 体数据使用方向掩膜模式).
    ModeMismatch {
        /// 采样模式.
        mode: &'static str,
        /// 数据源种类.
        source_kind: &'static str,
    },

    /// 掩膜值无法截断为整数 (NaN 或无穷大).
    NonFiniteValue {
        /// 体素坐标.
        pos: Idx3d,
        /// 原始值.
        value: f64,
    },

    /// 任务表无法读取或解析.
    JobTable {
        /// 任务表路径.
        path: PathBuf,
        /// 具体原因.
        reason: String,
    },
}

/// 转换运行时结果.
pub type ExportResult<T> = Result<T, ExportError>;

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceNotFound { path } => {
                write!(f, "source not found: {}", path.display())
            }
            Self::Unreadable { path, source } => {
                write!(f, "cannot read source {}: {source}", path.display())
            }
            Self::Nifti { path, source } => {
                write!(f, "cannot decode nifti {}: {source}", path.display())
            }
            Self::Tiff { path, source } => {
                write!(f, "cannot decode tiff {}: {source}", path.display())
            }
            Self::MalformedTrk { path, reason } => {
                write!(f, "malformed trk {}: {reason}", path.display())
            }
            Self::UnsupportedElementType(t) => write!(f, "unsupported element type `{t}`"),
            Self::DimensionMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "dimension mismatch in {}: expected {expected:?}, got {actual:?}",
                path.display()
            ),
            Self::OutputWrite { path, source } => {
                write!(f, "cannot write output {}: {source}", path.display())
            }
            Self::InvalidStride => write!(f, "stride must be at least 1"),
            Self::UnknownMode(m) => write!(f, "unknown sample mode `{m}`"),
            Self::ModeMismatch { mode, source_kind } => {
                write!(f, "sample mode `{mode}` cannot read a {source_kind} source")
            }
            Self::NonFiniteValue { pos, value } => {
                write!(f, "cannot truncate mask value {value} at {pos:?}")
            }
            Self::JobTable { path, reason } => {
                write!(f, "bad job table {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unreadable { source, .. } | Self::OutputWrite { source, .. } => Some(source),
            Self::Nifti { source, .. } => Some(source),
            Self::Tiff { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ExportError {
    /// 将打开/读取源文件时的 I/O 错误归类.
    pub(crate) fn from_source_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::SourceNotFound { path }
        } else {
            Self::Unreadable { path, source }
        }
    }

    /// 输出文件的 I/O 错误.
    #[inline]
    pub(crate) fn output(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExportError;
    use std::io;

    #[test]
    fn test_not_found_is_classified() {
        let e = ExportError::from_source_io("a.raw", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(e, ExportError::SourceNotFound { .. }));

        let e = ExportError::from_source_io("a.raw", io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(e, ExportError::Unreadable { .. }));
    }

    #[test]
    fn test_display_carries_context() {
        let e = ExportError::DimensionMismatch {
            path: "mask.nii".into(),
            expected: vec![4, 4, 4],
            actual: vec![4, 4, 3],
        };
        let s = e.to_string();
        assert!(s.contains("mask.nii"));
        assert!(s.contains("[4, 4, 4]"));
        assert!(s.contains("[4, 4, 3]"));
    }
}
