//! nifti 掩膜: 强度掩膜或方向向量掩膜.

use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use super::{Scalar, VolumeSource};
use crate::{ExportError, ExportResult, Idx3d};

/// nifti 规范允许的最大维数.
const MAX_NDIM: usize = 7;

/// nifti 格式的掩膜体数据, 体素值以 `f64` 保存.
///
/// 前三维为 `(x, y, z)`. 多于三维时, 最后一维视为分量维 (如方向向量的 3 个分量),
/// 其余额外维只取下标 0. 三维数据视为只有 1 个分量.
#[derive(Debug, Clone)]
pub struct MaskVolume {
    data: ArrayD<f64>,
}

impl MaskVolume {
    /// 打开 nii (或 nii.gz) 掩膜文件.
    pub fn open<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        Self::load(path.as_ref(), None)
    }

    /// 打开掩膜文件, 并检查前三维是否等于声明的 `dims`.
    pub fn open_expect<P: AsRef<Path>>(path: P, dims: Idx3d) -> ExportResult<Self> {
        let path = path.as_ref();
        let vol = Self::load(path, Some(dims))?;
        if vol.shape() != dims {
            return Err(ExportError::DimensionMismatch {
                path: path.to_owned(),
                expected: dims_vec(Some(dims)),
                actual: vol.data.shape().to_vec(),
            });
        }
        Ok(vol)
    }

    fn load(path: &Path, dims: Option<Idx3d>) -> ExportResult<Self> {
        if !path.exists() {
            return Err(ExportError::SourceNotFound {
                path: path.to_owned(),
            });
        }
        let nifti_err = |source| ExportError::Nifti {
            path: path.to_owned(),
            source,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
        let data = obj
            .into_volume()
            .into_ndarray::<f64>()
            .map_err(nifti_err)?;

        let shape = data.shape().to_vec();
        let vol = Self::from_array(data).ok_or_else(|| ExportError::DimensionMismatch {
            path: path.to_owned(),
            expected: dims_vec(dims),
            actual: shape,
        })?;
        log::info!(
            "NII - Mask array shape is {:?} ({} component(s))",
            vol.data.shape(),
            vol.components()
        );
        Ok(vol)
    }

    /// 直接由内存中的数组创建. 数组维数不在 `3..=7` 之间时返回 `None`.
    pub fn from_array(data: ArrayD<f64>) -> Option<Self> {
        (3..=MAX_NDIM)
            .contains(&data.ndim())
            .then_some(Self { data })
    }

    /// 每个体素的分量个数.
    #[inline]
    pub fn components(&self) -> usize {
        match self.data.ndim() {
            3 => 1,
            n => self.data.shape()[n - 1],
        }
    }

    /// 读取 `pos` 处第 `c` 个分量.
    ///
    /// 当 `pos` 或 `c` 越界时 panic.
    pub fn component(&self, (x, y, z): Idx3d, c: usize) -> f64 {
        let ndim = self.data.ndim();
        let mut idx = [0usize; MAX_NDIM];
        (idx[0], idx[1], idx[2]) = (x, y, z);
        if ndim > 3 {
            idx[ndim - 1] = c;
        } else {
            assert_eq!(c, 0, "3D 掩膜只有 1 个分量");
        }
        self.data[IxDyn(&idx[..ndim])]
    }
}

/// 错误信息中的声明形状. 未声明时为空.
fn dims_vec(dims: Option<Idx3d>) -> Vec<usize> {
    dims.map(|(x, y, z)| vec![x, y, z]).unwrap_or_default()
}

impl VolumeSource for MaskVolume {
    const KIND: &'static str = "nifti mask";

    #[inline]
    fn shape(&self) -> Idx3d {
        let s = self.data.shape();
        (s[0], s[1], s[2])
    }

    #[inline]
    fn scalar(&self, pos: Idx3d) -> Scalar {
        Scalar::Float(self.component(pos, 0))
    }

    fn direction(&self, pos: Idx3d) -> Option<[f64; 3]> {
        (self.components() >= 3).then(|| {
            [
                self.component(pos, 0),
                self.component(pos, 1),
                self.component(pos, 2),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_3d_mask_is_single_component() {
        let mut data = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        data[IxDyn(&[1, 2, 3])] = 254.7;
        let mask = MaskVolume::from_array(data).unwrap();

        assert_eq!(mask.shape(), (2, 3, 4));
        assert_eq!(mask.components(), 1);
        assert_eq!(mask.scalar((1, 2, 3)), Scalar::Float(254.7));
        assert_eq!(mask.direction((1, 2, 3)), None);
    }

    #[test]
    fn test_vector_mask() {
        let mut data = ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2, 3]));
        data[IxDyn(&[1, 0, 1, 0])] = 1.5;
        data[IxDyn(&[1, 0, 1, 1])] = -2.5;
        data[IxDyn(&[1, 0, 1, 2])] = 3.0;
        let mask = MaskVolume::from_array(data).unwrap();

        assert_eq!(mask.components(), 3);
        assert_eq!(mask.scalar((1, 0, 1)), Scalar::Float(1.5));
        assert_eq!(mask.direction((1, 0, 1)), Some([1.5, -2.5, 3.0]));
    }

    #[test]
    fn test_5d_vector_mask() {
        // nifti 向量图像常见的 (x, y, z, 1, 3) 形状.
        let mut data = ArrayD::<f64>::zeros(IxDyn(&[1, 1, 1, 1, 3]));
        data[IxDyn(&[0, 0, 0, 0, 2])] = 9.0;
        let mask = MaskVolume::from_array(data).unwrap();
        assert_eq!(mask.direction((0, 0, 0)), Some([0.0, 0.0, 9.0]));
    }

    #[test]
    fn test_rejects_low_rank() {
        assert!(MaskVolume::from_array(ArrayD::zeros(IxDyn(&[4, 4]))).is_none());
    }

    #[test]
    fn test_low_rank_file_reports_its_shape() {
        let p = std::env::temp_dir().join(format!("brain-viz-{}-flat.nii", std::process::id()));
        let flat = ndarray::Array2::<f32>::ones((4, 5));
        nifti::writer::WriterOptions::new(&p).write_nifti(&flat).unwrap();

        let r = MaskVolume::open_expect(&p, (4, 5, 1));
        std::fs::remove_file(&p).unwrap();
        match r {
            Err(ExportError::DimensionMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, vec![4, 5, 1]);
                assert_eq!(actual, vec![4, 5]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MaskVolume::open("/nonexistent/brain-viz/mask.nii"),
            Err(ExportError::SourceNotFound { .. })
        ));
    }
}
