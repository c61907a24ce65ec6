//! 错误到 HTTP 响应的映射

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use xspand_core::XspandError;

/// 处理器统一错误：资源缺失 404，其余 400
#[derive(Debug)]
pub struct ApiError(pub XspandError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<XspandError> for ApiError {
    fn from(error: XspandError) -> Self {
        ApiError(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_REQUEST
        }
    }

    fn detail(&self) -> String {
        match &self.0 {
            XspandError::NotFound(message)
            | XspandError::Validation(message)
            | XspandError::ExternalService(message)
            | XspandError::Database(message)
            | XspandError::Classification(message)
            | XspandError::Config(message)
            | XspandError::Internal(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::NOT_FOUND => debug!("Request failed: {}", self.0),
            _ => warn!("Request failed: {}", self.0),
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// JSON 请求体提取器，解析失败（含未知字段）按校验错误返回 400
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError(XspandError::Validation(rejection.body_text()))),
        }
    }
}

/// 查询参数提取器，解析失败同样返回 `{"detail"}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError(XspandError::Validation(rejection.body_text()))),
        }
    }
}
