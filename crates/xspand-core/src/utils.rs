//! 通用工具函数

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::{Result, XspandError};

/// 请求载荷校验
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// 校验邮箱格式
pub fn validate_email(email: &str) -> Result<()> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(XspandError::Validation(format!("invalid email address: {}", email)))
    }
}

/// 校验字段非空
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(XspandError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// 医患关系主键: `{doctor_id}_{patient_id}_{ordinal}`
pub fn relation_key(doctor_id: &str, patient_id: &str, ordinal: usize) -> String {
    format!("{}_{}_{}", doctor_id, patient_id, ordinal)
}

/// 医患对的锁键
pub fn pair_key(doctor_id: &str, patient_id: &str) -> String {
    format!("{}_{}", doctor_id, patient_id)
}

/// 生成新的实体 ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
