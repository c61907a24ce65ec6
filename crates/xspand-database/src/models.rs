//! 数据库模型

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// documents 表的一行
#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub collection: String,
    pub id: String,
    pub data: Json<Value>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRow {
    pub fn into_document(self) -> Value {
        self.data.0
    }
}
