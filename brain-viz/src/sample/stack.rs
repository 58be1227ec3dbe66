//! 多帧图像栈采样.

use std::io::Write;

use ndarray::Array3;

use super::below_last;
use crate::consts::STACK_PROGRESS_EVERY;
use crate::data::FrameSource;
use crate::output::{Point, RecordWriter};
use crate::{ExportError, ExportResult, Idx3d};

/// 图像栈采样结果.
#[derive(Debug, Clone)]
pub struct StackReport {
    /// 降采样后的占据立方体, 下标为 `(i / stride, j / stride, k / stride)`,
    /// 非零像素处为 1.
    pub cuboid: Array3<u8>,

    /// 实际解码的帧数.
    pub frames_read: usize,

    /// 写出的点数.
    pub retained: usize,
}

impl StackReport {
    /// 占据立方体的形状 `(深度, w, h)`.
    #[inline]
    pub fn cuboid_shape(&self) -> Idx3d {
        self.cuboid.dim()
    }
}

/// `below_last(dim, stride)` 的坐标个数.
#[inline]
fn visited_len(dim: usize, stride: usize) -> usize {
    dim.saturating_sub(1).div_ceil(stride)
}

/// 以步长 `stride` 在深度, w, h 三个方向上遍历图像栈, 将非零像素以 `(j / stride,
/// k / stride, i / stride)` 的坐标写入 `out`. `i`, `j`, `k` 分别为帧序号, 帧第一维与第二维下标.
///
/// 每个轴的最后一个下标都不会被访问. 只解码被访问到的帧.
pub fn sample_stack<F: FrameSource, W: Write>(
    src: &mut F,
    stride: usize,
    out: &mut RecordWriter<W>,
) -> ExportResult<StackReport> {
    if stride == 0 {
        return Err(ExportError::InvalidStride);
    }
    let (w, h) = src.frame_shape();
    let d = src.depth();

    let shape = (
        visited_len(d, stride),
        visited_len(w, stride),
        visited_len(h, stride),
    );
    log::info!("TIFF - Destination cuboid shape is {shape:?}");

    let mut report = StackReport {
        cuboid: Array3::zeros(shape),
        frames_read: 0,
        retained: 0,
    };

    for i in below_last(d, stride) {
        let z = i / stride;
        if z % STACK_PROGRESS_EVERY == 0 {
            log::info!("Scanning image layer {i}...");
        }

        let img = src.frame(i)?;
        report.frames_read += 1;

        for j in below_last(w, stride) {
            let x = j / stride;
            for k in below_last(h, stride) {
                let y = k / stride;
                if img[(j, k)] != 0 {
                    report.cuboid[(z, x, y)] = 1;
                    out.write_point(&Point::coords(x, y, z))?;
                    report.retained += 1;
                }
            }
        }
    }

    Ok(report)
}
