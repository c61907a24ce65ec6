//! 数据库查询操作

use serde_json::{Map, Value};
use sqlx::types::Json;
use xspand_core::{Result, XspandError};

use crate::connection::DatabasePool;
use crate::models::DocumentRow;

fn db_error(e: sqlx::Error) -> XspandError {
    XspandError::Database(e.to_string())
}

/// documents 表上的查询操作
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建文档表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection VARCHAR(64) NOT NULL,
                id VARCHAR(255) NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
        "#).execute(pool).await.map_err(db_error)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
            .execute(pool)
            .await
            .map_err(db_error)?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 根据集合和ID查找文档
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT collection, id, data, updated_at FROM documents WHERE collection = $1 AND id = $2"
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(row.map(DocumentRow::into_document))
    }

    /// 写入或覆盖文档
    pub async fn upsert_document(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
        "#)
        .bind(collection)
        .bind(id)
        .bind(Json(document))
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(())
    }

    /// 合并顶层字段，返回受影响的行数
    pub async fn merge_document(&self, collection: &str, id: &str, patch: Map<String, Value>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = NOW() WHERE collection = $1 AND id = $2"
        )
        .bind(collection)
        .bind(id)
        .bind(Json(Value::Object(patch)))
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    /// 删除文档
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_error)?;

        Ok(())
    }

    /// 列出集合中的全部文档
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT collection, id, data, updated_at FROM documents WHERE collection = $1"
        )
        .bind(collection)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }
}
