//! 数据源: raw 体数据, nifti 掩膜, trk 纤维束与多帧图像栈.
//!
//! 这些类型只负责把文件解码为内存中的数组或流, 不包含任何采样逻辑.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use either::Either;
use flate2::read::GzDecoder;
use num::ToPrimitive;

use crate::consts::GZ_EXT;
use crate::{ExportError, ExportResult, Idx3d};

pub mod elem;
pub mod mask;
pub mod raw;
pub mod stack;
pub mod trk;

pub use elem::{ElemType, Endian, Layout, RawElement};
pub use mask::MaskVolume;
pub use raw::{AnyRawVolume, RawVolume};
pub use stack::{FrameSource, MemoryStack, TiffStack};
pub use trk::{Streamline, Tractogram, TrkHeader, TrkReader, TrkSpace};

/// 体素标量值, 保留源数据的宽度.
///
/// 整数不带小数点显示, 浮点数以能还原该宽度的最短形式显示且总带小数点
/// (`5.0`, `f32` 的 `1.1`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    /// 有符号整数值, 以及不超过 `i64::MAX` 的无符号值.
    Int(i64),

    /// 超过 `i64::MAX` 的 `u64` 值.
    UInt(u64),

    /// 单精度浮点值.
    Float32(f32),

    /// 双精度浮点值.
    Float(f64),
}

impl Scalar {
    /// 是否满足 `self >= threshold`.
    #[inline]
    pub fn at_least(&self, threshold: i64) -> bool {
        match *self {
            Self::Int(v) => v >= threshold,
            Self::UInt(v) => threshold < 0 || v >= threshold as u64,
            Self::Float32(v) => f64::from(v) >= threshold as f64,
            Self::Float(v) => v >= threshold as f64,
        }
    }

    /// 向零截断为整数. NaN, 无穷大以及超出 `i64` 范围的值返回 `None`.
    #[inline]
    pub fn trunc(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => v.to_i64(),
            Self::Float32(v) => v.to_i64(),
            Self::Float(v) => v.to_i64(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v:?}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// 可按 `(x, y, z)` 整数坐标访问的 3D 标量场或向量场.
pub trait VolumeSource {
    /// 数据源种类, 仅用于错误信息.
    const KIND: &'static str;

    /// 数据形状 `(dimx, dimy, dimz)`.
    fn shape(&self) -> Idx3d;

    /// 读取 `pos` 处的标量值. 对于多分量数据, 返回第 0 个分量.
    ///
    /// 如果 `pos` 越界, 则程序 panic.
    fn scalar(&self, pos: Idx3d) -> Scalar;

    /// 读取 `pos` 处的三分量方向向量. 不支持向量的数据源返回 `None`.
    ///
    /// 如果 `pos` 越界, 则程序 panic.
    fn direction(&self, pos: Idx3d) -> Option<[f64; 3]>;
}

/// 普通文件或 gzip 压缩文件的读取器.
pub type SourceReader = Either<BufReader<File>, BufReader<GzDecoder<File>>>;

/// 打开源文件. 扩展名为 `.gz` 时自动解压.
pub fn open_source(path: &Path) -> ExportResult<SourceReader> {
    let file = File::open(path).map_err(|e| ExportError::from_source_io(path, e))?;
    let gz = path.extension().is_some_and(|ext| ext == GZ_EXT);
    Ok(if gz {
        Either::Right(BufReader::new(GzDecoder::new(file)))
    } else {
        Either::Left(BufReader::new(file))
    })
}

/// 读取源文件的全部字节.
pub(crate) fn read_source_bytes(path: &Path) -> ExportResult<Vec<u8>> {
    let mut buf = Vec::new();
    open_source(path)?
        .read_to_end(&mut buf)
        .map_err(|e| ExportError::from_source_io(path, e))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Int(5).to_string(), "5");
        assert_eq!(Scalar::Int(-3).to_string(), "-3");
        assert_eq!(Scalar::Float(1.5).to_string(), "1.5");
        assert_eq!(Scalar::Float(5.0).to_string(), "5.0");
        assert_eq!(Scalar::Float(-0.0).to_string(), "-0.0");
        assert_eq!(Scalar::Float32(1.1).to_string(), "1.1");
        assert_eq!(Scalar::Float32(5.0).to_string(), "5.0");
        assert_eq!(Scalar::UInt(u64::MAX).to_string(), "18446744073709551615");
    }

    #[test]
    fn test_scalar_threshold_and_trunc() {
        assert!(Scalar::Int(1).at_least(1));
        assert!(!Scalar::Int(0).at_least(1));
        assert!(Scalar::Float(0.5).at_least(0));
        assert!(!Scalar::Float(0.5).at_least(1));

        assert!(Scalar::UInt(u64::MAX).at_least(i64::MAX));
        assert!(Scalar::UInt(0).at_least(-1));
        assert!(Scalar::Float32(1.1).at_least(1));

        assert_eq!(Scalar::Float(254.9).trunc(), Some(254));
        assert_eq!(Scalar::Float(-1.7).trunc(), Some(-1));
        assert_eq!(Scalar::Float32(2.5).trunc(), Some(2));
        assert_eq!(Scalar::Int(7).trunc(), Some(7));
        assert_eq!(Scalar::Float(f64::NAN).trunc(), None);
        assert_eq!(Scalar::Float(f64::INFINITY).trunc(), None);
        assert_eq!(Scalar::UInt(u64::MAX).trunc(), None);
    }

    #[test]
    fn test_open_source_missing() {
        let p = std::env::temp_dir().join("brain-viz-definitely-missing.raw");
        assert!(matches!(
            read_source_bytes(&p),
            Err(ExportError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_open_source_gz() {
        let p = std::env::temp_dir().join(format!("brain-viz-{}-src.raw.gz", std::process::id()));
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&[1, 2, 3, 4]).unwrap();
        std::fs::write(&p, enc.finish().unwrap()).unwrap();

        assert_eq!(read_source_bytes(&p).unwrap(), vec![1, 2, 3, 4]);
        std::fs::remove_file(&p).unwrap();
    }
}
