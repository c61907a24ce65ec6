//! # Xspand Web模块
//!
//! `/api/v1` 下的 JSON 接口：医护人员、患者、疾病与 X 光检查。
//! 成功响应为 `{message, ...}` 信封，错误响应为 `{"detail": ...}`，
//! 资源缺失返回 404，其余错误返回 400。

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiJson, ApiQuery, ApiResult};
pub use server::{create_router, AppState, WebServer};
