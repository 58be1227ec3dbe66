#![warn(missing_docs)]

//! 核心库. 将小鼠脑成像数据转换为稀疏的文本点云, 以便下游 3D 可视化工具读取.
//!
//! 支持的数据源:
//!
//! 1. `.raw` 体数据 (可配置元素类型、字节序与存储布局);
//! 2. `.nii` 掩膜 (强度掩膜或方向向量掩膜);
//! 3. `.trk` 纤维束 (tractography streamlines);
//! 4. 多帧 `.tif` 图像栈.
//!
//! 输出格式: 每行一个记录, 字段以空格分隔, 行间以 `\n` 分隔,
//! 文件首尾均无多余换行.
//!
//! # 注意
//!
//! 1. 所有转换均为单线程、同步执行. 任何错误都会终止当前转换.
//! 2. 三个采样器在每个轴上都不访问末尾不完整的步长窗口 (见各模块文档).
//!   这是有意为之的边界策略, 请不要 "修复".
//!
//! # 开发计划
//!
//! ### raw / nii 体数据等步长采样 ✅
//!
//! 实现位于 `brain-viz/src/sample/volume.rs`.
//!
//! ### trk 纤维束抽稀与线段输出 ✅
//!
//! 坐标截断到一位小数. 实现位于 `brain-viz/src/sample/streamline.rs`.
//!
//! ### 多帧 tiff 逐帧解码与采样 ✅
//!
//! 一次只解码一帧, 以控制峰值内存. 实现位于 `brain-viz/src/sample/stack.rs`.
//!
//! ### 每个输出文件独立维护 "是否为空" 状态 ✅
//!
//! 实现位于 `brain-viz/src/output/mod.rs`.
//!
//! ### 任务表 ✅
//!
//! 以 json 描述一组转换任务, 由 `exports/driver` 依次执行.
//!
//! 实现位于 `brain-viz/src/jobs`.
//!
//! ### trk 体素顺序 (`voxel_order`) 翻转 ✅
//!
//! `voxel_order` 与 `vox_to_ras` 轴向不一致时按 nibabel 的方式翻转坐标轴.
//! 实现位于 `brain-viz/src/data/trk.rs`.

/// 三维索引 `(x, y, z)`.
pub type Idx3d = (usize, usize, usize);

/// 二维索引.
pub type Idx2d = (usize, usize);

pub mod consts;
pub mod data;
pub mod dataset;
pub mod error;
pub mod jobs;
pub mod output;
pub mod prelude;
pub mod sample;

pub use error::{ExportError, ExportResult};
