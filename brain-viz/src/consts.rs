//! 通用常量.

/// 默认输出目录 (相对于当前工作目录).
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// 输出文件名前缀.
pub const FILE_PREFIX: &str = "aa";

/// 输出文件扩展名.
pub const FILE_EXT: &str = "txt";

/// 记录之间的分隔符.
pub const RECORD_SEP: &[u8] = b"\n";

/// 记录内部字段之间的分隔符.
pub const FIELD_SEP: char = ' ';

/// 纤维束坐标截断精度 (保留一位小数).
pub const TRK_COORD_SCALE: f32 = 10.0;

/// 纤维束采样时, 每扫描这么多条纤维输出一次进度.
pub const TRK_PROGRESS_EVERY: usize = 10_000;

/// 图像栈采样时, 每处理这么多个输出层输出一次进度.
pub const STACK_PROGRESS_EVERY: usize = 10;

/// trk 文件头大小 (字节).
pub const TRK_HEADER_SIZE: usize = 1000;

/// trk 文件魔数.
pub const TRK_MAGIC: &[u8; 5] = b"TRACK";

/// gzip 压缩源文件的扩展名.
pub const GZ_EXT: &str = "gz";
