//! 常用类型与函数.

pub use crate::{ExportError, ExportResult, Idx2d, Idx3d};

pub use crate::data::{
    AnyRawVolume, ElemType, Endian, FrameSource, Layout, MaskVolume, MemoryStack, RawVolume,
    Scalar, Streamline, TiffStack, Tractogram, TrkReader, TrkSpace, VolumeSource,
};

pub use crate::output::{Payload, Point, RecordWriter, Segment};

pub use crate::sample::{
    sample_stack, sample_streamlines, sample_volume, SampleMode, StackReport, StreamlineReport,
    VolumeReport,
};

pub use crate::jobs::{
    convert_frame_stack, convert_streamlines, convert_volume, Job, JobOutcome, JobReport,
    JobTable, OutputName, StackJob, StreamlineJob, VolumeJob,
};

pub use crate::dataset::{home_dataset_dir, home_dataset_dir_with};
