//! 导出程序依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 初始化日志. 默认级别为 `Info`, 可由 `RUST_LOG` 覆盖.
///
/// 重复初始化时返回 `false`.
pub fn init_logger() -> bool {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_inits_once() {
        init_logger();
        assert!(!init_logger());
    }
}
