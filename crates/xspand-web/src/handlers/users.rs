//! 医生与放射科医生接口

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use xspand_core::{collections, DoctorPatch, RadiologistPatch, StaffRegistration};

use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

pub async fn register_doctor(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<StaffRegistration>,
) -> ApiResult<Json<Value>> {
    let doctor = state.engine.users.register_doctor(&registration).await?;
    Ok(Json(json!({
        "message": "Doctor registered successfully",
        "doctor": doctor
    })))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    ApiJson(patch): ApiJson<DoctorPatch>,
) -> ApiResult<Json<Value>> {
    let doctor = state.engine.users.update_doctor(&doctor_id, &patch).await?;
    Ok(Json(json!({
        "message": "Doctor updated successfully",
        "doctor": doctor
    })))
}

/// 删除医生及其全部医患关系
pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let removed = state.engine.users.delete_doctor(&doctor_id).await?;
    state.metrics.record_deletions(collections::DOCTORS, 1);
    state.metrics.record_deletions(collections::RELATIONS, removed);

    Ok(Json(json!({
        "message": "Doctor and all related records deleted successfully",
        "relations_deleted": removed
    })))
}

pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let doctors = state.engine.users.list_doctors().await?;
    Ok(Json(json!({
        "message": "Doctors retrieved successfully",
        "doctors": doctors
    })))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let doctor = state.engine.users.get_doctor(&doctor_id).await?;
    Ok(Json(json!({
        "message": "Doctor retrieved successfully",
        "doctor": doctor
    })))
}

pub async fn register_radiologist(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<StaffRegistration>,
) -> ApiResult<Json<Value>> {
    let radiologist = state.engine.users.register_radiologist(&registration).await?;
    Ok(Json(json!({
        "message": "Radiologist registered successfully",
        "radiologist": radiologist
    })))
}

pub async fn update_radiologist(
    State(state): State<AppState>,
    Path(radiologist_id): Path<String>,
    ApiJson(patch): ApiJson<RadiologistPatch>,
) -> ApiResult<Json<Value>> {
    let radiologist = state
        .engine
        .users
        .update_radiologist(&radiologist_id, &patch)
        .await?;
    Ok(Json(json!({
        "message": "Radiologist updated successfully",
        "radiologist": radiologist
    })))
}

/// 删除放射科医生，其审核过的检查回到未审核状态
pub async fn delete_radiologist(
    State(state): State<AppState>,
    Path(radiologist_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let reset = state.engine.users.delete_radiologist(&radiologist_id).await?;
    state.metrics.record_deletions(collections::RADIOLOGISTS, 1);

    Ok(Json(json!({
        "message": "Radiologist deleted successfully and scans updated",
        "scans_updated": reset
    })))
}

pub async fn list_radiologists(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let radiologists = state.engine.users.list_radiologists().await?;
    Ok(Json(json!({
        "message": "Radiologists retrieved successfully",
        "radiologists": radiologists
    })))
}

pub async fn get_radiologist(
    State(state): State<AppState>,
    Path(radiologist_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let radiologist = state.engine.users.get_radiologist(&radiologist_id).await?;
    Ok(Json(json!({
        "message": "Radiologist retrieved successfully",
        "radiologist": radiologist
    })))
}
