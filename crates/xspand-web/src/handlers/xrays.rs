//! X 光检查与分类接口

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use xspand_classifier::ClassificationOutcome;
use xspand_core::{collections, NewXRayScan, XRayScanPatch};

use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ClassifyQuery {
    /// 成功时把结果写回检查记录
    pub persist: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyUrlQuery {
    pub image_url: String,
}

fn record_outcome(state: &AppState, outcome: &ClassificationOutcome) {
    let label = if outcome.is_labeled() { "labeled" } else { "failed" };
    state.metrics.record_classification(label);
}

pub async fn add_scan(
    State(state): State<AppState>,
    ApiJson(new_scan): ApiJson<NewXRayScan>,
) -> ApiResult<Json<Value>> {
    let scan = state.engine.xrays.add_scan(new_scan).await?;
    Ok(Json(json!({
        "message": "X-ray scan added successfully",
        "scan_id": scan.scan_id,
        "scan_details": scan
    })))
}

/// 上传并立即分类；分类失败不影响保存
pub async fn add_scan_classified(
    State(state): State<AppState>,
    ApiJson(new_scan): ApiJson<NewXRayScan>,
) -> ApiResult<Json<Value>> {
    let classified = state.engine.xrays.add_scan_classified(new_scan).await?;
    record_outcome(&state, &classified.classification);

    Ok(Json(json!({
        "message": "X-ray scan added successfully",
        "scan_id": classified.scan.scan_id,
        "scan_details": classified.scan,
        "classification": classified.classification
    })))
}

pub async fn update_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
    ApiJson(patch): ApiJson<XRayScanPatch>,
) -> ApiResult<Json<Value>> {
    let scan = state.engine.xrays.update_scan(&scan_id, &patch).await?;
    Ok(Json(json!({
        "message": "X-ray scan updated successfully",
        "scan_id": scan.scan_id,
        "scan_details": scan
    })))
}

pub async fn list_scans(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let scans = state.engine.xrays.list_scans().await?;
    Ok(Json(json!({
        "message": "X-ray scans retrieved successfully",
        "scans": scans
    })))
}

pub async fn unverified_scans(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let scans = state.engine.xrays.unverified_scans().await?;
    Ok(Json(json!({
        "message": "Unverified X-ray scans retrieved successfully",
        "scans": scans
    })))
}

pub async fn scans_by_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let scans = state.engine.xrays.scans_for_patient(&patient_id).await?;
    Ok(Json(json!({
        "message": "X-ray scans retrieved successfully",
        "patient_id": patient_id,
        "scans": scans
    })))
}

pub async fn delete_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.xrays.delete_scan(&scan_id).await?;
    state.metrics.record_deletions(collections::XRAY_SCANS, 1);
    Ok(Json(json!({
        "message": "X-ray scan deleted successfully",
        "scan_id": scan_id
    })))
}

pub async fn classify_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
    ApiQuery(query): ApiQuery<ClassifyQuery>,
) -> ApiResult<Json<Value>> {
    let result = state
        .engine
        .xrays
        .classify_scan(&scan_id, query.persist.unwrap_or(false))
        .await?;
    record_outcome(&state, &result.classification);

    Ok(Json(json!({
        "message": "X-ray scan classified",
        "scan_id": result.scan_id,
        "classification": result.classification,
        "persisted": result.persisted
    })))
}

/// 只接受 `http(s)` URL，其他引用返回 400
pub async fn classify_url(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ClassifyUrlQuery>,
) -> ApiResult<Json<Value>> {
    let outcome = state.engine.xrays.classify_url(&query.image_url).await?;
    record_outcome(&state, &outcome);

    Ok(Json(json!({
        "message": "Image classified",
        "image_url": query.image_url,
        "classification": outcome
    })))
}
