//! 体数据 (raw / nii 掩膜) 等步长采样.

use std::io::Write;

use itertools::iproduct;

use super::{full_windows, SampleMode};
use crate::data::{Scalar, VolumeSource};
use crate::output::{Payload, Point, RecordWriter};
use crate::{ExportError, ExportResult, Idx3d};

/// 体数据采样统计.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeReport {
    /// 访问过的坐标个数.
    pub visited: usize,

    /// 写出的点数.
    pub retained: usize,
}

impl SampleMode {
    /// 对 `pos` 处体素应用保留谓词. 保留时返回该点的额外字段.
    pub fn retain<S: VolumeSource>(
        &self,
        src: &S,
        pos: Idx3d,
        threshold: i64,
    ) -> ExportResult<Option<Payload>> {
        let kept = match self {
            Self::Raw => {
                let v = src.scalar(pos);
                v.at_least(threshold).then_some(Payload::Scalar(v))
            }
            Self::CoordsOnly => src.scalar(pos).at_least(threshold).then_some(Payload::Empty),
            Self::Mask => {
                let v = truncated(src.scalar(pos), pos)?;
                (v >= threshold).then_some(Payload::Scalar(Scalar::Int(v)))
            }
            Self::MaskDirection => {
                let dir = src.direction(pos).ok_or(ExportError::ModeMismatch {
                    mode: self.name(),
                    source_kind: S::KIND,
                })?;
                let a = truncated(Scalar::Float(dir[0]), pos)?;
                let b = truncated(Scalar::Float(dir[1]), pos)?;
                let c = truncated(Scalar::Float(dir[2]), pos)?;
                (a != 0 && b != 0 && c != 0).then(|| Payload::Text(format!("{a} {b} {c}")))
            }
        };
        Ok(kept)
    }
}

/// 掩膜值截断为整数, 无法截断时报错.
fn truncated(v: Scalar, pos: Idx3d) -> ExportResult<i64> {
    v.trunc().ok_or_else(|| ExportError::NonFiniteValue {
        pos,
        value: match v {
            Scalar::Int(i) => i as f64,
            Scalar::UInt(u) => u as f64,
            Scalar::Float32(f) => f64::from(f),
            Scalar::Float(f) => f,
        },
    })
}

/// 以步长 `stride` 在 x, y, z 三个方向上遍历 `src`, 将满足 `mode` 保留谓词的体素写入 `out`.
///
/// 遍历顺序为 x 最外层, z 最内层. 每个轴只访问满足 `coord + stride <= dim` 的坐标,
/// 末尾不完整的步长窗口不会被访问.
pub fn sample_volume<S: VolumeSource, W: Write>(
    src: &S,
    stride: usize,
    mode: SampleMode,
    threshold: i64,
    out: &mut RecordWriter<W>,
) -> ExportResult<VolumeReport> {
    if stride == 0 {
        return Err(ExportError::InvalidStride);
    }
    let (dx, dy, dz) = src.shape();
    let mut report = VolumeReport::default();

    for (x, y, z) in iproduct!(
        full_windows(dx, stride),
        full_windows(dy, stride),
        full_windows(dz, stride)
    ) {
        if y == 0 && z == 0 {
            log::debug!("Scanning x = {x}/{dx}");
        }
        report.visited += 1;
        if let Some(payload) = mode.retain(src, (x, y, z), threshold)? {
            out.write_point(&Point::with(x, y, z, payload))?;
            report.retained += 1;
        }
    }

    log::info!(
        "{} point(s) retained out of {} visited voxel(s) (mode `{mode}`, stride {stride}, threshold {threshold})",
        report.retained,
        report.visited
    );
    Ok(report)
}
