//! 纤维束抽稀与线段输出.

use std::io::Write;

use crate::consts::TRK_PROGRESS_EVERY;
use crate::data::Streamline;
use crate::output::{RecordWriter, Segment};
use crate::{ExportError, ExportResult};

/// 纤维束采样统计.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StreamlineReport {
    /// 按步长访问过的纤维条数.
    pub scanned: usize,

    /// 长度达标而被写出的纤维条数.
    pub retained: usize,

    /// 写出的线段总数.
    pub nodes: usize,
}

/// 依次访问第 `0, stride, 2 * stride, ...` 条纤维, 将节点数不少于 `min_length`
/// 的纤维拆成相邻节点线段写入 `out`.
///
/// 线段的额外字段为 `"{scanned} {len}"`, 其中 `scanned` 是该纤维在被访问纤维中的序号
/// (从 0 开始, 只对按步长访问到的纤维计数), `len` 为其节点数.
///
/// 被跳过的纤维同样会被解码; 其中的解码错误也会终止采样.
pub fn sample_streamlines<I, W>(
    streamlines: I,
    stride: usize,
    min_length: usize,
    out: &mut RecordWriter<W>,
) -> ExportResult<StreamlineReport>
where
    I: IntoIterator<Item = ExportResult<Streamline>>,
    W: Write,
{
    if stride == 0 {
        return Err(ExportError::InvalidStride);
    }
    log::info!("Writing fibers of at least {min_length} nodes, 1 in {stride}");

    let mut report = StreamlineReport::default();
    for (index, line) in streamlines.into_iter().enumerate() {
        let line = line?;
        if index % stride != 0 {
            continue;
        }

        if report.scanned % TRK_PROGRESS_EVERY == 0 {
            log::info!("Scanning fiber {}...", report.scanned);
        }

        let len = line.len();
        if len >= min_length {
            let payload = format!("{} {len}", report.scanned);
            for pair in line.windows(2) {
                out.write_segment(&Segment::new(pair[0], pair[1], payload.clone()))?;
                report.nodes += 1;
            }
            report.retained += 1;
        }
        report.scanned += 1;
    }

    log::info!(
        "{} fibers of at least {min_length} nodes were written. The total number of written nodes is {}.",
        report.retained,
        report.nodes
    );
    Ok(report)
}
