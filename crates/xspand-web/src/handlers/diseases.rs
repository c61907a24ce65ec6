//! 疾病接口

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use xspand_core::{collections, DiseasePatch, NewDisease};

use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

pub async fn add_disease(
    State(state): State<AppState>,
    ApiJson(new_disease): ApiJson<NewDisease>,
) -> ApiResult<Json<Value>> {
    let disease = state.engine.diseases.add_disease(new_disease).await?;
    Ok(Json(json!({
        "message": "Disease added successfully",
        "disease_id": disease.disease_id,
        "disease": disease
    })))
}

pub async fn list_diseases(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let diseases = state.engine.diseases.list_diseases().await?;
    Ok(Json(json!({
        "message": "Diseases retrieved successfully",
        "diseases": diseases
    })))
}

pub async fn get_disease(
    State(state): State<AppState>,
    Path(disease_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let disease = state.engine.diseases.get_disease(&disease_id).await?;
    Ok(Json(json!({
        "message": "Disease retrieved successfully",
        "disease": disease
    })))
}

pub async fn update_disease(
    State(state): State<AppState>,
    Path(disease_id): Path<String>,
    ApiJson(patch): ApiJson<DiseasePatch>,
) -> ApiResult<Json<Value>> {
    let disease = state.engine.diseases.update_disease(&disease_id, &patch).await?;
    Ok(Json(json!({
        "message": "Disease updated successfully",
        "disease": disease
    })))
}

pub async fn delete_disease(
    State(state): State<AppState>,
    Path(disease_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.diseases.delete_disease(&disease_id).await?;
    state.metrics.record_deletions(collections::DISEASES, 1);
    Ok(Json(json!({ "message": "Disease deleted successfully" })))
}

/// 每种疾病关联过的患者数（含已结束的治疗）
pub async fn all_patient_counts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let counts = state.engine.diseases.disease_patient_counts(false).await?;
    Ok(Json(json!({
        "message": "Disease patient counts retrieved successfully",
        "disease_patient_counts": counts
    })))
}

/// 每种疾病正在治疗的患者数
pub async fn current_patient_counts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let counts = state.engine.diseases.disease_patient_counts(true).await?;
    Ok(Json(json!({
        "message": "Disease patient counts retrieved successfully",
        "disease_patient_counts": counts
    })))
}
