//! 类型化记录存取
//!
//! 所有实体都经由 `RecordStore` 读写：缺失记录统一转成 `NotFound`，
//! 部分更新先在进程内合并并按实体结构校验，通过后才写回存储。

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use xspand_core::{Record, Result, XspandError};

use crate::memory::MemoryDocumentStore;
use crate::store::{merge_document, DocumentStore};

/// 文档存储之上的类型化门面
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn DocumentStore>,
}

impl RecordStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 基于内存存储的实例
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    /// 读取记录，不存在时返回 `NotFound`
    pub async fn get<T: Record>(&self, id: &str) -> Result<T> {
        self.find(id)
            .await?
            .ok_or_else(|| XspandError::NotFound(format!("{} {} not found", T::KIND, id)))
    }

    /// 读取记录，不存在时返回 `None`
    pub async fn find<T: Record>(&self, id: &str) -> Result<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(document) => decode_record::<T>(id, document).map(Some),
            None => Ok(None),
        }
    }

    pub async fn exists<T: Record>(&self, id: &str) -> Result<bool> {
        Ok(self.store.get(T::COLLECTION, id).await?.is_some())
    }

    /// 以记录自身的主键写入
    pub async fn create<T: Record>(&self, record: &T) -> Result<()> {
        self.write(record).await?;
        debug!("Created {} {}", T::KIND, record.record_id());
        Ok(())
    }

    /// 整体覆盖已有记录，用于需要清空字段的场景
    pub async fn put<T: Record>(&self, record: &T) -> Result<()> {
        self.write(record).await?;
        debug!("Replaced {} {}", T::KIND, record.record_id());
        Ok(())
    }

    async fn write<T: Record>(&self, record: &T) -> Result<()> {
        let document = serde_json::to_value(record)?;
        self.store.set(T::COLLECTION, record.record_id(), document).await
    }

    /// 部分更新：补丁中未设置的字段保持不变，返回合并后的记录
    pub async fn update<T: Record, P: Serialize>(&self, id: &str, patch: &P) -> Result<T> {
        let patch = match serde_json::to_value(patch)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(XspandError::Validation(format!(
                    "{} update must be a JSON object",
                    T::KIND
                )))
            }
        };

        let mut merged = self
            .store
            .get(T::COLLECTION, id)
            .await?
            .ok_or_else(|| XspandError::NotFound(format!("{} {} not found", T::KIND, id)))?;
        merge_document(&mut merged, &patch)?;

        let record: T = serde_json::from_value(merged)
            .map_err(|e| XspandError::Validation(format!("invalid {} update: {}", T::KIND, e)))?;

        if !patch.is_empty() {
            self.store.update(T::COLLECTION, id, patch).await?;
        }
        debug!("Updated {} {}", T::KIND, id);
        Ok(record)
    }

    pub async fn delete<T: Record>(&self, id: &str) -> Result<()> {
        self.store.delete(T::COLLECTION, id).await?;
        debug!("Deleted {} {}", T::KIND, id);
        Ok(())
    }

    /// 全量列出集合，顺序不保证；无法解析的文档会被跳过
    pub async fn list<T: Record>(&self) -> Result<Vec<T>> {
        let documents = self.store.list(T::COLLECTION).await?;
        let mut records = Vec::with_capacity(documents.len());

        for document in documents {
            match serde_json::from_value::<T>(document) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed {} document: {}", T::KIND, e),
            }
        }
        Ok(records)
    }

    /// 由存储分配新 ID
    pub fn generate_id(&self) -> String {
        self.store.generate_id()
    }
}

fn decode_record<T: Record>(id: &str, document: Value) -> Result<T> {
    serde_json::from_value(document)
        .map_err(|e| XspandError::Database(format!("corrupt {} record {}: {}", T::KIND, id, e)))
}
