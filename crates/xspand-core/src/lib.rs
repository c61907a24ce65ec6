//! # Xspand Core
//!
//! 医疗记录系统的核心模块，提供实体模型、部分更新补丁、错误定义和通用校验工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{Result, XspandError};
pub use models::*;
