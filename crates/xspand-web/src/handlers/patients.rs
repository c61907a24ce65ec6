//! 患者与治疗接口

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use xspand_core::{
    collections, CompletePatientRegistration, PatientPatch, SimplePatientRegistration, TreatmentPatch,
    TreatmentStatus,
};
use xspand_workflow::RegistrationOutcome;

use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::server::AppState;

/// 治疗状态修改参数
#[derive(Debug, Deserialize)]
pub struct TreatmentStatusQuery {
    pub doctor_id: String,
    pub status: TreatmentStatus,
    pub disease_id: Option<String>,
}

/// 注册结果展开成扁平的响应体
fn registration_response(outcome: &RegistrationOutcome) -> Value {
    let mut body = Map::new();
    body.insert("message".to_string(), json!(outcome.message()));

    let patient_id = match outcome {
        RegistrationOutcome::PatientExists { patient_id }
        | RegistrationOutcome::OngoingRelationExists { patient_id, .. }
        | RegistrationOutcome::RelationCreated { patient_id, .. } => patient_id.clone(),
        RegistrationOutcome::PatientCreated { patient, .. }
        | RegistrationOutcome::PatientRegistered { patient, .. } => {
            body.insert("patient_details".to_string(), json!(patient));
            patient.patient_id.clone()
        }
    };
    body.insert("patient_id".to_string(), json!(patient_id));

    if let Some(relation) = outcome.relation() {
        body.insert("relation_id".to_string(), json!(relation.relation_id));
        body.insert("treatment_status".to_string(), json!(relation.treatment_status));
        body.insert("treatment_start_date".to_string(), json!(relation.treatment_start_date));
    }

    Value::Object(body)
}

pub async fn register_patient(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<SimplePatientRegistration>,
) -> ApiResult<Json<Value>> {
    let outcome = state.engine.patients.register_patient(&registration).await?;
    Ok(Json(registration_response(&outcome)))
}

pub async fn register_complete_patient(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<CompletePatientRegistration>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .engine
        .patients
        .register_complete_patient(&registration)
        .await?;
    Ok(Json(registration_response(&outcome)))
}

pub async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let patients = state.engine.patients.list_patients().await?;
    Ok(Json(json!({
        "message": "Patients retrieved successfully",
        "patients": patients
    })))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let patient = state.engine.patients.get_patient(&patient_id).await?;
    Ok(Json(json!({
        "message": "Patient retrieved successfully",
        "patient": patient
    })))
}

pub async fn update_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    ApiJson(patch): ApiJson<PatientPatch>,
) -> ApiResult<Json<Value>> {
    let patient = state.engine.patients.update_patient(&patient_id, &patch).await?;
    Ok(Json(json!({
        "message": "Patient updated successfully",
        "patient": patient
    })))
}

/// 删除患者及其全部医患关系
pub async fn delete_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let removed = state.engine.patients.delete_patient(&patient_id).await?;
    state.metrics.record_deletions(collections::PATIENTS, 1);
    state.metrics.record_deletions(collections::RELATIONS, removed);

    Ok(Json(json!({
        "message": "Patient and related records deleted successfully",
        "relations_deleted": removed
    })))
}

pub async fn patient_complete_details(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let details = state.engine.patients.patient_complete_details(&patient_id).await?;
    Ok(Json(json!({
        "message": "Patient details retrieved successfully",
        "patient_details": details.patient_details,
        "current_treatment": details.current_treatment
    })))
}

pub async fn patient_scans(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // 患者不存在时返回 404，而不是空列表
    state.engine.patients.get_patient(&patient_id).await?;
    let scans = state.engine.xrays.scans_for_patient(&patient_id).await?;
    Ok(Json(json!({
        "message": "Patient scans retrieved successfully",
        "patient_id": patient_id,
        "scans": scans
    })))
}

pub async fn patients_status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let statuses = state.engine.patients.patients_status().await?;
    Ok(Json(json!({
        "message": "Patient statuses retrieved successfully",
        "patients": statuses
    })))
}

pub async fn update_treatment_status(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    ApiQuery(query): ApiQuery<TreatmentStatusQuery>,
) -> ApiResult<Json<Value>> {
    let relation = state
        .engine
        .patients
        .update_treatment_status(&patient_id, &query.doctor_id, query.status, query.disease_id.as_deref())
        .await?;
    Ok(Json(json!({
        "message": "Treatment status updated successfully",
        "treatment_details": relation
    })))
}

pub async fn update_treatment(
    State(state): State<AppState>,
    Path((patient_id, doctor_id)): Path<(String, String)>,
    ApiJson(patch): ApiJson<TreatmentPatch>,
) -> ApiResult<Json<Value>> {
    let relation = state
        .engine
        .patients
        .update_treatment(&patient_id, &doctor_id, &patch)
        .await?;
    Ok(Json(json!({
        "message": "Treatment details updated successfully",
        "relation_id": relation.relation_id,
        "treatment_details": relation
    })))
}

/// 医生名下的全部患者（含已结束的治疗）
pub async fn doctor_patients(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let patients = state.engine.patients.doctor_patients(&doctor_id, false).await?;
    Ok(Json(json!({
        "message": "Doctor's patients retrieved successfully",
        "doctor_id": doctor_id,
        "patients": patients
    })))
}

/// 医生正在治疗的患者
pub async fn doctor_current_patients(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let patients = state.engine.patients.doctor_patients(&doctor_id, true).await?;
    Ok(Json(json!({
        "message": "Doctor's current patients retrieved successfully",
        "doctor_id": doctor_id,
        "patients": patients
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use xspand_core::{DoctorPatientRelation, Patient};

    #[test]
    fn test_registration_response_is_flat() {
        let relation = DoctorPatientRelation::ongoing("d1_p1_1".to_string(), "d1", "p1", Utc::now());
        let outcome = RegistrationOutcome::PatientCreated {
            patient: Patient::minimal("p1", true),
            relation,
        };

        let body = registration_response(&outcome);
        assert_eq!(body["relation_id"], "d1_p1_1");
        assert_eq!(body["patient_id"], "p1");
        assert_eq!(body["treatment_status"], "Ongoing");
        assert_eq!(body["patient_details"]["is_resident"], true);
    }

    #[test]
    fn test_complete_registration_response_carries_details() {
        let relation = DoctorPatientRelation::ongoing("d1_p1_1".to_string(), "d1", "p1", Utc::now());
        let mut patient = Patient::minimal("p1", false);
        patient.full_name = Some("Ada Lovelace".to_string());
        let outcome = RegistrationOutcome::PatientRegistered { patient, relation };

        let body = registration_response(&outcome);
        assert_eq!(body["message"], "Patient registered successfully with doctor relationship");
        assert_eq!(body["patient_details"]["full_name"], "Ada Lovelace");
        assert_eq!(body["relation_id"], "d1_p1_1");
    }

    #[test]
    fn test_existing_patient_response_has_no_relation() {
        let outcome = RegistrationOutcome::PatientExists {
            patient_id: "p1".to_string(),
        };

        let body = registration_response(&outcome);
        assert_eq!(body["message"], "Patient ID already exists");
        assert!(body.get("relation_id").is_none());
    }
}
