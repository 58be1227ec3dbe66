//! 等步长采样器.
//!
//! 三个采样器在每个轴上都会截掉末尾不完整的部分:
//!
//! 1. 体数据只访问满足 `coord + stride <= dim` 的坐标;
//! 2. 图像栈只访问 `coord < dim - 1` 的坐标 (最后一个下标永远不会被访问).

use std::fmt;
use std::iter::StepBy;
use std::ops::Range;
use std::str::FromStr;

use crate::ExportError;

pub mod stack;
pub mod streamline;
pub mod volume;

pub use stack::{sample_stack, StackReport};
pub use streamline::{sample_streamlines, StreamlineReport};
pub use volume::{sample_volume, VolumeReport};

/// 体数据采样模式. 每个模式对应一种保留谓词与额外字段的组合.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String"))]
pub enum SampleMode {
    /// 值 `>= threshold` 时保留, 额外字段为该值.
    Raw,

    /// 值 `>= threshold` 时保留, 无额外字段.
    CoordsOnly,

    /// 值截断为整数后 `>= threshold` 时保留, 额外字段为截断值.
    Mask,

    /// 三个分量截断为整数后全部非零时保留 (不使用 threshold),
    /// 额外字段为三个截断值.
    MaskDirection,
}

impl SampleMode {
    /// 模式标签.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::CoordsOnly => "coords-only",
            Self::Mask => "mask",
            Self::MaskDirection => "mask-dir",
        }
    }

    /// 该模式是否读取 nifti 掩膜 (否则读取 raw 体数据).
    #[inline]
    pub fn reads_mask(&self) -> bool {
        matches!(self, Self::Mask | Self::MaskDirection)
    }
}

impl FromStr for SampleMode {
    type Err = ExportError;

    /// 也接受旧任务列表中的 `andrix-*` 标签.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" | "andrix-raw" => Ok(Self::Raw),
            "coords-only" | "andrix-only-coords" => Ok(Self::CoordsOnly),
            "mask" | "andrix-mask" => Ok(Self::Mask),
            "mask-dir" | "andrix-mask-dir" => Ok(Self::MaskDirection),
            other => Err(ExportError::UnknownMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for SampleMode {
    type Error = ExportError;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for SampleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `0, stride, 2 * stride, ...` 中满足 `coord + stride <= dim` 的坐标.
///
/// 个数为 `ceil((dim - stride + 1) / stride)`; `dim < stride` 时为空.
#[inline]
pub(crate) fn full_windows(dim: usize, stride: usize) -> StepBy<Range<usize>> {
    debug_assert_ne!(stride, 0);
    (0..(dim + 1).saturating_sub(stride)).step_by(stride)
}

/// `0, stride, 2 * stride, ...` 中满足 `coord < dim - 1` 的坐标.
#[inline]
pub(crate) fn below_last(dim: usize, stride: usize) -> StepBy<Range<usize>> {
    debug_assert_ne!(stride, 0);
    (0..dim.saturating_sub(1)).step_by(stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("raw".parse::<SampleMode>().unwrap(), SampleMode::Raw);
        assert_eq!(
            "andrix-only-coords".parse::<SampleMode>().unwrap(),
            SampleMode::CoordsOnly
        );
        assert_eq!(
            "mask-dir".parse::<SampleMode>().unwrap(),
            SampleMode::MaskDirection
        );
        assert!(matches!(
            "andrix-foo".parse::<SampleMode>(),
            Err(ExportError::UnknownMode(_))
        ));
        for m in [
            SampleMode::Raw,
            SampleMode::CoordsOnly,
            SampleMode::Mask,
            SampleMode::MaskDirection,
        ] {
            assert_eq!(m.to_string().parse::<SampleMode>().unwrap(), m);
        }
    }

    #[test]
    fn test_full_windows_count() {
        for dim in 0..20usize {
            for stride in 1..6usize {
                let got: Vec<_> = full_windows(dim, stride).collect();
                let expected = if dim >= stride {
                    (dim - stride + 1).div_ceil(stride)
                } else {
                    0
                };
                assert_eq!(got.len(), expected, "dim = {dim}, stride = {stride}");
                assert!(got.iter().all(|c| c + stride <= dim));
            }
        }
        assert_eq!(full_windows(4, 2).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(full_windows(5, 2).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_below_last() {
        assert_eq!(below_last(3, 1).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(below_last(5, 2).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(below_last(1, 1).count(), 0);
        assert_eq!(below_last(0, 1).count(), 0);
    }
}
