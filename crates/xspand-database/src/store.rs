//! 文档存储接口

use async_trait::async_trait;
use serde_json::{Map, Value};
use xspand_core::{Result, XspandError};

/// 外部文档数据库需要提供的能力：按集合存取、浅合并更新、全量列举
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取文档，不存在时返回 `None`
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// 写入（覆盖）文档
    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<()>;

    /// 将补丁中的顶层字段合并进已有文档，文档不存在时返回 `NotFound`
    async fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<()>;

    /// 删除文档，不存在时视为成功
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// 列出集合中的全部文档，顺序不保证
    async fn list(&self, collection: &str) -> Result<Vec<Value>>;

    /// 由存储分配的文档 ID
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// 将补丁的顶层字段覆盖到文档上
pub fn merge_document(document: &mut Value, patch: &Map<String, Value>) -> Result<()> {
    let target = document
        .as_object_mut()
        .ok_or_else(|| XspandError::Database("stored document is not a JSON object".to_string()))?;

    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}
