//! 多帧图像栈 (如多页 tiff).
//!
//! 帧数组的形状记为 `(w, h)`: `w` 是解码后帧数组的第一维 (图像行数),
//! `h` 是第二维 (图像列数). 栈深度 `d` 为帧数.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult, Limits};

use crate::{ExportError, ExportResult, Idx2d};

/// 可按帧序号访问的二维整数帧序列. 所有帧形状相同.
pub trait FrameSource {
    /// 单帧形状 `(w, h)`.
    fn frame_shape(&self) -> Idx2d;

    /// 帧数.
    fn depth(&self) -> usize;

    /// 解码第 `index` 帧.
    fn frame(&mut self, index: usize) -> ExportResult<Array2<i64>>;
}

/// 多页 tiff 图像栈. 每次只解码一帧.
pub struct TiffStack {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    shape: Idx2d,
    depth: usize,
}

impl TiffStack {
    /// 打开 tiff 文件, 统计帧数并读取第一帧的形状.
    pub fn open<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path).map_err(|e| ExportError::from_source_io(&path, e))?;
        let tiff_err = |source| ExportError::Tiff {
            path: path.clone(),
            source,
        };

        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(tiff_err)?
            .with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions().map_err(tiff_err)?;
        let mut depth = 1;
        while decoder.more_images() {
            decoder.next_image().map_err(tiff_err)?;
            depth += 1;
        }
        decoder.seek_to_image(0).map_err(tiff_err)?;

        let shape = (height as usize, width as usize);
        log::info!(
            "TIFF - Multi-frame TIFF Image has {depth} frames with dimensions {:?}",
            shape
        );

        Ok(Self {
            path,
            decoder,
            shape,
            depth,
        })
    }

    fn tiff_err(&self, source: tiff::TiffError) -> ExportError {
        ExportError::Tiff {
            path: self.path.clone(),
            source,
        }
    }
}

impl FrameSource for TiffStack {
    #[inline]
    fn frame_shape(&self) -> Idx2d {
        self.shape
    }

    #[inline]
    fn depth(&self) -> usize {
        self.depth
    }

    fn frame(&mut self, index: usize) -> ExportResult<Array2<i64>> {
        self.decoder
            .seek_to_image(index)
            .map_err(|e| self.tiff_err(e))?;

        let (width, height) = self.decoder.dimensions().map_err(|e| self.tiff_err(e))?;
        let shape = (height as usize, width as usize);
        if shape != self.shape {
            return Err(ExportError::DimensionMismatch {
                path: self.path.clone(),
                expected: vec![self.shape.0, self.shape.1],
                actual: vec![shape.0, shape.1],
            });
        }

        let image = self.decoder.read_image().map_err(|e| self.tiff_err(e))?;
        let pixels: Vec<i64> = match image {
            DecodingResult::U8(v) => v.into_iter().map(i64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(i64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(i64::from).collect(),
            DecodingResult::U64(v) => v.into_iter().map(|p| p as i64).collect(),
            DecodingResult::I8(v) => v.into_iter().map(i64::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(i64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(i64::from).collect(),
            DecodingResult::I64(v) => v,
            _ => {
                return Err(ExportError::UnsupportedElementType(format!(
                    "floating point tiff frame in {}",
                    self.path.display()
                )))
            }
        };

        // 多通道 (如 RGB) 帧的像素数与形状不符.
        let n = pixels.len();
        Array2::from_shape_vec(shape, pixels).map_err(|_| ExportError::DimensionMismatch {
            path: self.path.clone(),
            expected: vec![shape.0 * shape.1],
            actual: vec![n],
        })
    }
}

/// 已在内存中的图像栈.
#[derive(Debug, Clone)]
pub struct MemoryStack {
    frames: Vec<Array2<i64>>,
    shape: Idx2d,
}

impl MemoryStack {
    /// 由帧列表创建. 帧列表为空或帧形状不一致时返回 `None`.
    pub fn new(frames: Vec<Array2<i64>>) -> Option<Self> {
        let shape = frames.first()?.dim();
        frames
            .iter()
            .all(|f| f.dim() == shape)
            .then_some(Self { frames, shape })
    }
}

impl FrameSource for MemoryStack {
    #[inline]
    fn frame_shape(&self) -> Idx2d {
        self.shape
    }

    #[inline]
    fn depth(&self) -> usize {
        self.frames.len()
    }

    /// 当 `index` 越界时 panic.
    #[inline]
    fn frame(&mut self, index: usize) -> ExportResult<Array2<i64>> {
        Ok(self.frames[index].clone())
    }
}
