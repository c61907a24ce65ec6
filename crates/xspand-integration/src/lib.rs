//! # Xspand集成模块
//!
//! 与外部身份认证服务的对接：医生和放射科医生注册时创建登录身份，删除时吊销。

pub mod auth;

pub use auth::{AuthProvider, IdentityToolkitProvider, MemoryAuthProvider};
