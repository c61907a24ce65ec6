//! # Xspand数据库模块
//!
//! 对外部文档数据库的薄封装：`DocumentStore` 描述按集合存取 JSON 文档的能力，
//! 提供内存实现与 PostgreSQL (JSONB) 实现；`RecordStore` 在其上提供类型化的增删改查。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod records;
pub mod store;

// 重新导出主要类型
pub use connection::{DatabasePool, PgDocumentStore};
pub use memory::MemoryDocumentStore;
pub use queries::DatabaseQueries;
pub use records::RecordStore;
pub use store::{merge_document, DocumentStore};
