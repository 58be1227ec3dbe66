//! 输出文件命名规则.
//!
//! 所有文件名形如 `aa-{token}-{dims}-1-in-{stride}[-thresh-{threshold}].txt`.

use std::path::{Path, PathBuf};

use crate::consts::{FILE_EXT, FILE_PREFIX};
use crate::{Idx2d, Idx3d};

/// raw / nii 体数据的输出文件名. `dims` 为 `(dimx, dimy, dimz)`.
///
/// 文件名中的维度按 `{dimz}x{dimy}x{dimx}` 书写, 与源文件名中的习惯一致.
pub fn volume_file_name(token: &str, (x, y, z): Idx3d, stride: usize, threshold: i64) -> String {
    format!("{FILE_PREFIX}-{token}-{z}x{y}x{x}-1-in-{stride}-thresh-{threshold}.{FILE_EXT}")
}

/// 纤维束的输出文件名. `dims_label` 一般取自 trk 文件头 (如 `522x448x400`).
pub fn fibers_file_name(token: &str, dims_label: &str, stride: usize, min_length: usize) -> String {
    format!(
        "{FILE_PREFIX}-fibers-{token}-{dims_label}-1-in-{stride}-thresh-{min_length}.{FILE_EXT}"
    )
}

/// 图像栈的输出文件名. `(w, h)` 为单帧形状, `d` 为帧数.
pub fn stack_file_name(token: &str, (w, h): Idx2d, d: usize, stride: usize) -> String {
    format!("{FILE_PREFIX}-{token}-{w}x{h}x{d}-1-in-{stride}.{FILE_EXT}")
}

/// 将文件名放到 `dir` 目录下.
#[inline]
pub fn in_dir<P: AsRef<Path>>(dir: P, name: String) -> PathBuf {
    dir.as_ref().join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(
            volume_file_name("corpus", (545, 755, 760), 2, 1),
            "aa-corpus-760x755x545-1-in-2-thresh-1.txt"
        );
        assert_eq!(
            fibers_file_name("demyel", "522x448x400", 30, 7),
            "aa-fibers-demyel-522x448x400-1-in-30-thresh-7.txt"
        );
        assert_eq!(
            stack_file_name("vessels", (1024, 512), 300, 2),
            "aa-vessels-1024x512x300-1-in-2.txt"
        );
        assert_eq!(
            in_dir("output", stack_file_name("a", (1, 2), 3, 1)),
            PathBuf::from("output/aa-a-1x2x3-1-in-1.txt")
        );
    }
}
