//! `.raw` 体数据: 无文件头的定长元素序列.

use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ShapeBuilder};

use super::elem::{decode_all, ElemType, Endian, Layout, RawElement};
use super::{read_source_bytes, Scalar, VolumeSource};
use crate::{ExportError, ExportResult, Idx3d};

/// 以 `T` 为元素类型的 raw 体数据. 加载后不可变.
#[derive(Debug, Clone)]
pub struct RawVolume<T> {
    data: Array3<T>,
}

impl<T: RawElement> RawVolume<T> {
    /// 打开 raw 文件. `dims` 为 `(dimx, dimy, dimz)`.
    ///
    /// 文件字节数必须恰好等于 `dimx * dimy * dimz * T::WIDTH`, 否则返回
    /// `ExportError::DimensionMismatch`. 乘积溢出时同样返回该错误, 此时
    /// `expected` 为声明的三个维度.
    pub fn open<P: AsRef<Path>>(
        path: P,
        dims: Idx3d,
        endian: Endian,
        layout: Layout,
    ) -> ExportResult<Self> {
        let path = path.as_ref();
        let bytes = read_source_bytes(path)?;

        let (x, y, z) = dims;
        let expected = x
            .checked_mul(y)
            .and_then(|n| n.checked_mul(z))
            .and_then(|n| n.checked_mul(T::WIDTH))
            .ok_or_else(|| ExportError::DimensionMismatch {
                path: path.to_owned(),
                expected: vec![x, y, z],
                actual: vec![bytes.len()],
            })?;
        if bytes.len() != expected {
            return Err(ExportError::DimensionMismatch {
                path: path.to_owned(),
                expected: vec![expected],
                actual: vec![bytes.len()],
            });
        }

        let values = decode_all::<T>(&bytes, endian);
        let data = match layout {
            Layout::C => Array3::from_shape_vec(dims, values),
            Layout::Fortran => Array3::from_shape_vec(dims.f(), values),
        }
        .map_err(|_| ExportError::DimensionMismatch {
            path: path.to_owned(),
            expected: vec![x, y, z],
            actual: vec![bytes.len() / T::WIDTH],
        })?;

        Ok(Self { data })
    }

    /// 直接由内存中的数组创建. 数组下标为 `(x, y, z)`.
    #[inline]
    pub fn from_array(data: Array3<T>) -> Self {
        Self { data }
    }
}

impl<T> Index<Idx3d> for RawVolume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T: RawElement> VolumeSource for RawVolume<T> {
    const KIND: &'static str = "raw";

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn scalar(&self, pos: Idx3d) -> Scalar {
        self[pos].to_scalar()
    }

    #[inline]
    fn direction(&self, _pos: Idx3d) -> Option<[f64; 3]> {
        None
    }
}

/// 元素类型在运行时才确定的 raw 体数据.
#[derive(Debug, Clone)]
pub enum AnyRawVolume {
    /// `u1`.
    U8(RawVolume<u8>),
    /// `i1`.
    I8(RawVolume<i8>),
    /// `u2`.
    U16(RawVolume<u16>),
    /// `i2`.
    I16(RawVolume<i16>),
    /// `u4`.
    U32(RawVolume<u32>),
    /// `i4`.
    I32(RawVolume<i32>),
    /// `u8`.
    U64(RawVolume<u64>),
    /// `i8`.
    I64(RawVolume<i64>),
    /// `f4`.
    F32(RawVolume<f32>),
    /// `f8`.
    F64(RawVolume<f64>),
}

/// 对 `AnyRawVolume` 的每个分支执行同一表达式.
macro_rules! dispatch {
    ($self: expr, $v: ident => $e: expr) => {
        match $self {
            AnyRawVolume::U8($v) => $e,
            AnyRawVolume::I8($v) => $e,
            AnyRawVolume::U16($v) => $e,
            AnyRawVolume::I16($v) => $e,
            AnyRawVolume::U32($v) => $e,
            AnyRawVolume::I32($v) => $e,
            AnyRawVolume::U64($v) => $e,
            AnyRawVolume::I64($v) => $e,
            AnyRawVolume::F32($v) => $e,
            AnyRawVolume::F64($v) => $e,
        }
    };
}

impl AnyRawVolume {
    /// 按 `elem` 描述的元素类型打开 raw 文件. `dims` 为 `(dimx, dimy, dimz)`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        dims: Idx3d,
        elem: ElemType,
        layout: Layout,
    ) -> ExportResult<Self> {
        let p = path.as_ref();
        // 单字节类型的字节序无关紧要.
        let e = elem.endian().unwrap_or_default();
        let vol = match elem {
            ElemType::U8 => Self::U8(RawVolume::open(p, dims, e, layout)?),
            ElemType::I8 => Self::I8(RawVolume::open(p, dims, e, layout)?),
            ElemType::U16(_) => Self::U16(RawVolume::open(p, dims, e, layout)?),
            ElemType::I16(_) => Self::I16(RawVolume::open(p, dims, e, layout)?),
            ElemType::U32(_) => Self::U32(RawVolume::open(p, dims, e, layout)?),
            ElemType::I32(_) => Self::I32(RawVolume::open(p, dims, e, layout)?),
            ElemType::U64(_) => Self::U64(RawVolume::open(p, dims, e, layout)?),
            ElemType::I64(_) => Self::I64(RawVolume::open(p, dims, e, layout)?),
            ElemType::F32(_) => Self::F32(RawVolume::open(p, dims, e, layout)?),
            ElemType::F64(_) => Self::F64(RawVolume::open(p, dims, e, layout)?),
        };
        log::info!(
            "RAW - Loaded {} as `{elem}` with shape {:?}",
            p.display(),
            vol.shape()
        );
        Ok(vol)
    }
}

impl VolumeSource for AnyRawVolume {
    const KIND: &'static str = "raw";

    #[inline]
    fn shape(&self) -> Idx3d {
        dispatch!(self, v => v.shape())
    }

    #[inline]
    fn scalar(&self, pos: Idx3d) -> Scalar {
        dispatch!(self, v => v.scalar(pos))
    }

    #[inline]
    fn direction(&self, _pos: Idx3d) -> Option<[f64; 3]> {
        None
    }
}
