//! 数据库连接管理

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use xspand_core::{Result, XspandError};

use crate::queries::DatabaseQueries;
use crate::store::DocumentStore;

/// 数据库连接池
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| XspandError::Database(format!("failed to connect: {}", e)))?;

        tracing::info!("Connected to PostgreSQL (max_connections={})", max_connections);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// 基于 PostgreSQL JSONB 的文档存储
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: DatabasePool,
}

impl PgDocumentStore {
    /// 连接数据库并确保表存在
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = DatabasePool::connect(connection_string, max_connections).await?;
        DatabaseQueries::new(&pool).create_tables().await?;
        Ok(Self { pool })
    }

    fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.pool)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.queries().get_document(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        self.queries().upsert_document(collection, id, document).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<()> {
        let affected = self.queries().merge_document(collection, id, patch).await?;
        if affected == 0 {
            return Err(XspandError::NotFound(format!("{}/{}", collection, id)));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.queries().delete_document(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        self.queries().list_documents(collection).await
    }
}
