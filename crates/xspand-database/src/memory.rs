//! 内存文档存储，用于本地开发和测试

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use xspand_core::{Result, XspandError};

use crate::store::{merge_document, DocumentStore};

/// 以 `collection -> id -> document` 组织的内存存储
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 集合中的文档数量
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|documents| documents.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| XspandError::NotFound(format!("{}/{}", collection, id)))?;

        merge_document(document, &patch)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryDocumentStore::new();
        store.set("patients", "p1", json!({ "patient_id": "p1" })).await.unwrap();

        assert_eq!(
            store.get("patients", "p1").await.unwrap(),
            Some(json!({ "patient_id": "p1" }))
        );
        assert_eq!(store.get("patients", "p2").await.unwrap(), None);

        store.delete("patients", "p1").await.unwrap();
        assert_eq!(store.count("patients").await, 0);

        // 删除不存在的文档不报错
        store.delete("patients", "p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing_document() {
        let store = MemoryDocumentStore::new();
        store
            .set("diseases", "d1", json!({ "disease_name": "Edema", "severity_level": 2 }))
            .await
            .unwrap();

        let patch = json!({ "severity_level": 3 });
        store
            .update("diseases", "d1", patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(
            store.get("diseases", "d1").await.unwrap(),
            Some(json!({ "disease_name": "Edema", "severity_level": 3 }))
        );

        let missing = store.update("diseases", "d2", Map::new()).await;
        assert!(matches!(missing, Err(XspandError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_collection() {
        let store = MemoryDocumentStore::new();
        store.set("patients", "p1", json!({})).await.unwrap();
        store.set("patients", "p2", json!({})).await.unwrap();
        store.set("doctors", "d1", json!({})).await.unwrap();

        assert_eq!(store.list("patients").await.unwrap().len(), 2);
        assert!(store.list("xray_scans").await.unwrap().is_empty());
    }
}
