//! 运行结果.

use brain_viz::jobs::{JobOutcome, JobReport};
use std::io::{self, Write};
use std::time::Duration;

/// 将单个任务的结果写进 `w` 中.
fn describe_into<W: Write>(kind: &str, o: &JobOutcome, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Job `{kind}`:")?;
    writeln!(w, "{S4}Output: {}", o.output.display())?;
    writeln!(w, "{S4}Records written: {}", o.records)?;
    match &o.report {
        JobReport::Volume(r) => {
            write!(w, "{S4}Voxels visited: {}, retained: {}", r.visited, r.retained)?;
        }
        JobReport::Streamlines(r) => {
            write!(
                w,
                "{S4}Streamlines scanned: {}, retained: {}, nodes: {}",
                r.scanned, r.retained, r.nodes
            )?;
        }
        JobReport::FrameStack {
            cuboid_shape,
            frames_read,
            retained,
        } => {
            write!(
                w,
                "{S4}Frames decoded: {frames_read}, cuboid: {cuboid_shape:?}, points: {retained}"
            )?;
        }
    }
    Ok(())
}

/// 全部任务的最终结果.
pub struct ExportSummary {
    data: Vec<(&'static str, JobOutcome)>,
    elapsed: Duration,
}

impl ExportSummary {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, JobOutcome)>>(
        it: I,
        elapsed: Duration,
    ) -> Self {
        Self {
            data: it.into_iter().collect(),
            elapsed,
        }
    }

    /// 输出运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (kind, outcome) in self.data.iter() {
            if describe_into(kind, outcome, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();

            utils::sep();
        }
        println!(
            "{} job(s) finished in {:.3} s",
            self.data.len(),
            self.elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_viz::sample::VolumeReport;
    use std::path::PathBuf;

    #[test]
    fn test_describe_volume() {
        let o = JobOutcome {
            output: PathBuf::from("output/a.txt"),
            records: 8,
            report: JobReport::Volume(VolumeReport {
                visited: 8,
                retained: 8,
            }),
        };
        let mut buf = Vec::new();
        describe_into("volume", &o, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "Job `volume`:\n    Output: output/a.txt\n    Records written: 8\n    Voxels visited: 8, retained: 8"
        );
    }
}
