//! 身份认证服务连接器
//!
//! - `MemoryAuthProvider`：进程内实现，用于开发和测试
//! - `IdentityToolkitProvider`：Identity Toolkit 风格的 REST 接口

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use xspand_core::{Result, XspandError};

/// 身份认证服务接口
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 创建登录身份，返回服务端签发的用户 ID
    async fn create_user(&self, email: &str, password: &str) -> Result<String>;

    /// 删除登录身份
    async fn delete_user(&self, uid: &str) -> Result<()>;
}

/// 内存身份服务
#[derive(Debug, Default)]
pub struct MemoryAuthProvider {
    users: RwLock<HashMap<String, String>>, // uid -> email
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, uid: &str) -> bool {
        self.users.read().await.contains_key(uid)
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn create_user(&self, email: &str, _password: &str) -> Result<String> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.eq_ignore_ascii_case(email)) {
            return Err(XspandError::ExternalService(format!(
                "the user with the provided email ({}) already exists",
                email
            )));
        }

        let uid = uuid::Uuid::new_v4().simple().to_string();
        users.insert(uid.clone(), email.to_string());
        debug!("Created auth identity {} for {}", uid, email);
        Ok(uid)
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        match self.users.write().await.remove(uid) {
            Some(_) => Ok(()),
            None => Err(XspandError::ExternalService(format!(
                "no user record found for the provided identifier ({})",
                uid
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    local_id: &'a str,
}

/// Identity Toolkit 风格的 REST 身份服务
///
/// 创建：`POST {endpoint}/accounts:signUp?key=...`，响应中的 `localId` 作为用户 ID；
/// 删除：`POST {endpoint}/accounts:delete?key=...`，需要服务账号令牌。
pub struct IdentityToolkitProvider {
    endpoint: String,
    api_key: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl IdentityToolkitProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| XspandError::Config(format!("failed to build HTTP client: {}", e)))?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!("Using identity provider at {}", endpoint);

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            bearer_token,
            client,
        })
    }

    fn url(&self, action: &str) -> String {
        format!("{}/accounts:{}?key={}", self.endpoint, action, self.api_key)
    }

    /// 添加认证头
    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn error_detail(response: reqwest::Response) -> String {
        let status = response.status();
        match response.text().await {
            Ok(body) if !body.is_empty() => format!("{}: {}", status, body),
            _ => status.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitProvider {
    async fn create_user(&self, email: &str, password: &str) -> Result<String> {
        let body = SignUpRequest {
            email,
            password,
            return_secure_token: false,
        };

        let response = self
            .with_auth(self.client.post(self.url("signUp")).json(&body))
            .send()
            .await
            .map_err(|e| XspandError::ExternalService(format!("identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            let detail = Self::error_detail(response).await;
            warn!("Failed to create auth identity for {}: {}", email, detail);
            return Err(XspandError::ExternalService(format!(
                "failed to create user: {}",
                detail
            )));
        }

        let created: SignUpResponse = response
            .json()
            .await
            .map_err(|e| XspandError::ExternalService(format!("unexpected identity response: {}", e)))?;

        info!("Created auth identity {}", created.local_id);
        Ok(created.local_id)
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        let response = self
            .with_auth(
                self.client
                    .post(self.url("delete"))
                    .json(&DeleteRequest { local_id: uid }),
            )
            .send()
            .await
            .map_err(|e| XspandError::ExternalService(format!("identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            let detail = Self::error_detail(response).await;
            return Err(XspandError::ExternalService(format!(
                "failed to delete user {}: {}",
                uid, detail
            )));
        }

        info!("Deleted auth identity {}", uid);
        Ok(())
    }
}
