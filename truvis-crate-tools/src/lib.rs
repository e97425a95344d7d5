//! Truvis 工具集
//!
//! 目前只提供日志初始化。
//!
//! # 日志
//! 格式为 `[time] LEVEL [file:line] msg`，默认级别为 Info，可以通过 `RUST_LOG` 覆盖。

pub mod init_log;
