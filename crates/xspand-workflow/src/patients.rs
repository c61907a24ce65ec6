//! 患者管理
//!
//! 患者注册会同时建立医患关系；治疗状态相关的修改都委托给 `RelationshipManager`。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use xspand_core::utils::Validate;
use xspand_core::{
    CompletePatientRegistration, Disease, Doctor, DoctorPatientRelation, Patient, PatientPatch, Result,
    SimplePatientRegistration, TreatmentPatch, TreatmentStatus, XspandError,
};
use xspand_database::RecordStore;

use crate::relationship::{RelationRegistration, RelationshipManager};

/// 患者注册结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// 完整注册时患者已存在，未做任何修改
    PatientExists { patient_id: String },
    /// 医患对已有进行中的关系
    OngoingRelationExists {
        patient_id: String,
        relation: DoctorPatientRelation,
    },
    /// 患者已存在，新建了关系
    RelationCreated {
        patient_id: String,
        relation: DoctorPatientRelation,
    },
    /// 简易注册新建了患者和关系
    PatientCreated {
        patient: Patient,
        relation: DoctorPatientRelation,
    },
    /// 完整注册新建了患者和关系
    PatientRegistered {
        patient: Patient,
        relation: DoctorPatientRelation,
    },
}

impl RegistrationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RegistrationOutcome::PatientExists { .. } => "Patient ID already exists",
            RegistrationOutcome::OngoingRelationExists { .. } => {
                "An ongoing doctor-patient relationship already exists"
            }
            RegistrationOutcome::RelationCreated { .. } => {
                "Patient already exists, created new doctor-patient relationship"
            }
            RegistrationOutcome::PatientCreated { .. } => {
                "New patient registered successfully with doctor relationship"
            }
            RegistrationOutcome::PatientRegistered { .. } => {
                "Patient registered successfully with doctor relationship"
            }
        }
    }

    pub fn relation(&self) -> Option<&DoctorPatientRelation> {
        match self {
            RegistrationOutcome::PatientExists { .. } => None,
            RegistrationOutcome::OngoingRelationExists { relation, .. }
            | RegistrationOutcome::RelationCreated { relation, .. }
            | RegistrationOutcome::PatientCreated { relation, .. }
            | RegistrationOutcome::PatientRegistered { relation, .. } => Some(relation),
        }
    }
}

/// 关联记录的查找结果，缺失时带说明
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Lookup<T> {
    Found(T),
    Missing { message: String },
}

impl<T> Lookup<T> {
    fn from_result(result: Result<T>) -> Result<Self> {
        match result {
            Ok(value) => Ok(Lookup::Found(value)),
            Err(e) if e.is_not_found() => Ok(Lookup::Missing {
                message: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// 当前治疗信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentTreatment {
    pub relation_id: String,
    pub doctor_details: Lookup<Doctor>,
    pub treatment_status: TreatmentStatus,
    pub treatment_start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease_details: Option<Lookup<Disease>>,
}

/// 患者完整信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientDetails {
    pub patient_details: Patient,
    pub current_treatment: Option<CurrentTreatment>,
}

/// 医生名下的患者
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorPatientEntry {
    pub patient: Patient,
    pub relation_id: String,
    pub treatment_status: TreatmentStatus,
    pub treatment_start_date: DateTime<Utc>,
    pub treatment_end_date: Option<DateTime<Utc>>,
}

/// 患者当前治疗状态概览
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientStatus {
    pub patient_id: String,
    pub full_name: Option<String>,
    /// 无任何关系时为空
    pub treatment_status: Option<TreatmentStatus>,
    pub doctor_id: Option<String>,
}

pub struct PatientService {
    records: RecordStore,
    relationships: Arc<RelationshipManager>,
}

impl PatientService {
    pub fn new(records: RecordStore, relationships: Arc<RelationshipManager>) -> Self {
        Self {
            records,
            relationships,
        }
    }

    /// 简易注册：患者不存在时先建最小记录，再建立关系
    pub async fn register_patient(&self, registration: &SimplePatientRegistration) -> Result<RegistrationOutcome> {
        registration.validate()?;
        self.ensure_doctor(&registration.doctor_id).await?;

        let patient = match self.records.find::<Patient>(&registration.patient_id).await? {
            Some(_) => None,
            None => {
                let patient = Patient::minimal(&registration.patient_id, registration.is_resident);
                self.records.create(&patient).await?;
                Some(patient)
            }
        };

        let registered = self
            .relationships
            .register(&registration.doctor_id, &registration.patient_id)
            .await?;
        let patient_id = registration.patient_id.clone();

        Ok(match (registered, patient) {
            (RelationRegistration::Existing(relation), _) => {
                RegistrationOutcome::OngoingRelationExists { patient_id, relation }
            }
            (RelationRegistration::Created(relation), Some(patient)) => {
                RegistrationOutcome::PatientCreated { patient, relation }
            }
            (RelationRegistration::Created(relation), None) => {
                RegistrationOutcome::RelationCreated { patient_id, relation }
            }
        })
    }

    /// 完整注册：患者已存在时不做任何修改
    pub async fn register_complete_patient(
        &self,
        registration: &CompletePatientRegistration,
    ) -> Result<RegistrationOutcome> {
        registration.validate()?;

        if self.records.exists::<Patient>(&registration.patient_id).await? {
            return Ok(RegistrationOutcome::PatientExists {
                patient_id: registration.patient_id.clone(),
            });
        }
        self.ensure_doctor(&registration.doctor_id).await?;

        let patient = registration.to_patient();
        self.records.create(&patient).await?;
        tracing::info!("Registered patient {}", patient.patient_id);

        let registered = self
            .relationships
            .register(&registration.doctor_id, &registration.patient_id)
            .await?;
        Ok(match registered {
            RelationRegistration::Existing(relation) => RegistrationOutcome::OngoingRelationExists {
                patient_id: patient.patient_id,
                relation,
            },
            RelationRegistration::Created(relation) => RegistrationOutcome::PatientRegistered { patient, relation },
        })
    }

    pub async fn update_patient(&self, patient_id: &str, patch: &PatientPatch) -> Result<Patient> {
        patch.validate()?;
        let patient = self.records.update::<Patient, _>(patient_id, patch).await?;
        tracing::info!("Updated patient {}", patient_id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient> {
        self.records.get(patient_id).await
    }

    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        self.records.list().await
    }

    /// 删除患者及其全部医患关系，返回删除的关系条数
    pub async fn delete_patient(&self, patient_id: &str) -> Result<usize> {
        self.records.get::<Patient>(patient_id).await?;

        let removed = self.relationships.delete_for_patient(patient_id).await?;
        self.records.delete::<Patient>(patient_id).await?;

        tracing::info!("Deleted patient {} and {} relations", patient_id, removed);
        Ok(removed)
    }

    /// 患者信息及当前治疗（医生、诊断）
    pub async fn patient_complete_details(&self, patient_id: &str) -> Result<PatientDetails> {
        let patient = self.get_patient(patient_id).await?;

        let ongoing = self
            .relationships
            .relations_for_patient(patient_id)
            .await?
            .into_iter()
            .filter(|r| r.is_ongoing())
            .max_by(|a, b| a.treatment_start_date.cmp(&b.treatment_start_date));

        let current_treatment = match ongoing {
            Some(relation) => {
                let doctor_details = Lookup::from_result(self.records.get::<Doctor>(&relation.doctor_id).await)?;
                let disease_details = match (relation.diagnosed_with_disease, relation.diagnosed_disease_id.as_deref()) {
                    (true, Some(disease_id)) => {
                        Some(Lookup::from_result(self.records.get::<Disease>(disease_id).await)?)
                    }
                    _ => None,
                };
                Some(CurrentTreatment {
                    relation_id: relation.relation_id,
                    doctor_details,
                    treatment_status: relation.treatment_status,
                    treatment_start_date: relation.treatment_start_date,
                    disease_details,
                })
            }
            None => None,
        };

        Ok(PatientDetails {
            patient_details: patient,
            current_treatment,
        })
    }

    /// 医生名下的患者；患者记录已删除的关系会被跳过
    pub async fn doctor_patients(&self, doctor_id: &str, ongoing_only: bool) -> Result<Vec<DoctorPatientEntry>> {
        let relations = self.relationships.relations_for_doctor(doctor_id).await?;

        let mut entries = Vec::new();
        for relation in relations {
            if ongoing_only && !relation.is_ongoing() {
                continue;
            }
            let Some(patient) = self.records.find::<Patient>(&relation.patient_id).await? else {
                tracing::debug!("Skipping relation {} without patient record", relation.relation_id);
                continue;
            };
            entries.push(DoctorPatientEntry {
                patient,
                relation_id: relation.relation_id,
                treatment_status: relation.treatment_status,
                treatment_start_date: relation.treatment_start_date,
                treatment_end_date: relation.treatment_end_date,
            });
        }
        entries.sort_by(|a, b| a.patient.patient_id.cmp(&b.patient.patient_id));
        Ok(entries)
    }

    /// 所有患者的当前治疗状态
    pub async fn patients_status(&self) -> Result<Vec<PatientStatus>> {
        let patients = self.list_patients().await?;
        let relations = self.relationships.relations().await?;

        let mut statuses: Vec<PatientStatus> = patients
            .into_iter()
            .map(|patient| {
                let own: Vec<&DoctorPatientRelation> =
                    relations.iter().filter(|r| r.patient_id == patient.patient_id).collect();
                let current = own
                    .iter()
                    .filter(|r| r.is_ongoing())
                    .max_by_key(|r| r.treatment_start_date)
                    .or_else(|| own.iter().max_by_key(|r| r.treatment_end_date));

                PatientStatus {
                    patient_id: patient.patient_id,
                    full_name: patient.full_name,
                    treatment_status: current.map(|r| r.treatment_status),
                    doctor_id: current.map(|r| r.doctor_id.clone()),
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        Ok(statuses)
    }

    /// 修改治疗状态；提供疾病 ID 时必须是已存在的疾病
    pub async fn update_treatment_status(
        &self,
        patient_id: &str,
        doctor_id: &str,
        status: TreatmentStatus,
        disease_id: Option<&str>,
    ) -> Result<DoctorPatientRelation> {
        if let Some(disease_id) = disease_id {
            self.records.get::<Disease>(disease_id).await?;
        }
        self.relationships
            .update_status(doctor_id, patient_id, status, disease_id)
            .await
    }

    pub async fn update_treatment(
        &self,
        patient_id: &str,
        doctor_id: &str,
        patch: &TreatmentPatch,
    ) -> Result<DoctorPatientRelation> {
        patch.validate()?;
        if let Some(disease_id) = &patch.diagnosed_disease_id {
            self.records.get::<Disease>(disease_id).await?;
        }
        self.relationships
            .update_treatment(patient_id, doctor_id, patch)
            .await
    }

    async fn ensure_doctor(&self, doctor_id: &str) -> Result<()> {
        if self.records.exists::<Doctor>(doctor_id).await? {
            Ok(())
        } else {
            Err(XspandError::NotFound(format!("Doctor {} not found", doctor_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xspand_core::{Gender, SeverityLevel, UserRole};

    struct Fixture {
        records: RecordStore,
        relationships: Arc<RelationshipManager>,
        patients: PatientService,
    }

    async fn fixture() -> Fixture {
        let records = RecordStore::in_memory();
        let relationships = Arc::new(RelationshipManager::new(records.clone()));
        let patients = PatientService::new(records.clone(), relationships.clone());

        for id in ["d1", "d2"] {
            records
                .create(&Doctor {
                    user_id: id.to_string(),
                    email: format!("{}@example.com", id),
                    role: UserRole::Doctor,
                    full_name: format!("Doctor {}", id),
                    specialization: "Pulmonology".to_string(),
                })
                .await
                .unwrap();
        }
        Fixture {
            records,
            relationships,
            patients,
        }
    }

    fn simple(patient_id: &str, doctor_id: &str) -> SimplePatientRegistration {
        SimplePatientRegistration {
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            is_resident: true,
        }
    }

    fn complete(patient_id: &str, doctor_id: &str) -> CompletePatientRegistration {
        CompletePatientRegistration {
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            full_name: "Ada Lovelace".to_string(),
            is_resident: false,
            email_address: "ada@example.com".to_string(),
            contact_number: "+44 20 0000".to_string(),
            age: 36,
            height_cm: 165.0,
            weight_kg: 55.0,
            gender: Gender::Female,
        }
    }

    #[tokio::test]
    async fn test_register_patient_outcomes() {
        let f = fixture().await;

        let first = f.patients.register_patient(&simple("p1", "d1")).await.unwrap();
        assert!(matches!(first, RegistrationOutcome::PatientCreated { .. }));
        assert_eq!(f.patients.get_patient("p1").await.unwrap(), Patient::minimal("p1", true));

        let again = f.patients.register_patient(&simple("p1", "d1")).await.unwrap();
        assert!(matches!(again, RegistrationOutcome::OngoingRelationExists { .. }));
        assert_eq!(again.relation(), first.relation());

        let second_doctor = f.patients.register_patient(&simple("p1", "d2")).await.unwrap();
        assert!(matches!(second_doctor, RegistrationOutcome::RelationCreated { .. }));
        assert_eq!(f.relationships.relations_for_patient("p1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_register_with_unknown_doctor_is_not_found() {
        let f = fixture().await;
        let result = f.patients.register_patient(&simple("p1", "ghost")).await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));
        assert!(f.records.find::<Patient>("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_registration() {
        let f = fixture().await;

        let outcome = f.patients.register_complete_patient(&complete("p1", "d1")).await.unwrap();
        assert_eq!(outcome.message(), "Patient registered successfully with doctor relationship");
        match outcome {
            RegistrationOutcome::PatientRegistered { patient, relation } => {
                assert_eq!(patient.full_name.as_deref(), Some("Ada Lovelace"));
                assert!(relation.is_ongoing());
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let again = f.patients.register_complete_patient(&complete("p1", "d2")).await.unwrap();
        assert_eq!(
            again,
            RegistrationOutcome::PatientExists {
                patient_id: "p1".to_string()
            }
        );
        assert!(f.relationships.relations_for_doctor("d2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_patient_cascades() {
        let f = fixture().await;
        f.patients.register_patient(&simple("p1", "d1")).await.unwrap();
        f.patients.register_patient(&simple("p1", "d2")).await.unwrap();
        f.patients.register_patient(&simple("p2", "d1")).await.unwrap();

        assert_eq!(f.patients.delete_patient("p1").await.unwrap(), 2);
        assert!(f.relationships.relations_for_patient("p1").await.unwrap().is_empty());
        assert_eq!(f.relationships.relations().await.unwrap().len(), 1);

        let again = f.patients.delete_patient("p1").await;
        assert!(matches!(again, Err(XspandError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_patient_complete_details() {
        let f = fixture().await;
        let disease = Disease {
            disease_id: "dz1".to_string(),
            disease_name: "Pneumonia".to_string(),
            description: "infection".to_string(),
            severity_level: SeverityLevel::Moderate,
            common_symptoms: vec![],
            treatment_methods: vec![],
        };
        f.records.create(&disease).await.unwrap();

        f.patients.register_patient(&simple("p1", "d1")).await.unwrap();
        let details = f.patients.patient_complete_details("p1").await.unwrap();
        let treatment = details.current_treatment.unwrap();
        assert!(matches!(treatment.doctor_details, Lookup::Found(ref d) if d.user_id == "d1"));
        assert!(treatment.disease_details.is_none());

        f.patients
            .update_treatment_status("p1", "d1", TreatmentStatus::Ongoing, Some("dz1"))
            .await
            .unwrap();
        f.records.delete::<Doctor>("d1").await.unwrap();

        let details = f.patients.patient_complete_details("p1").await.unwrap();
        let treatment = details.current_treatment.unwrap();
        assert!(matches!(treatment.doctor_details, Lookup::Missing { .. }));
        assert_eq!(treatment.disease_details, Some(Lookup::Found(disease)));
    }

    #[tokio::test]
    async fn test_details_without_ongoing_treatment() {
        let f = fixture().await;
        f.patients.register_patient(&simple("p1", "d1")).await.unwrap();
        f.patients
            .update_treatment_status("p1", "d1", TreatmentStatus::Completed, None)
            .await
            .unwrap();

        let details = f.patients.patient_complete_details("p1").await.unwrap();
        assert!(details.current_treatment.is_none());
    }

    #[tokio::test]
    async fn test_doctor_patients_and_status() {
        let f = fixture().await;
        f.patients.register_patient(&simple("p1", "d1")).await.unwrap();
        f.patients.register_patient(&simple("p2", "d1")).await.unwrap();
        f.patients.register_patient(&simple("p3", "d2")).await.unwrap();
        f.records.create(&Patient::minimal("p4", false)).await.unwrap();
        f.patients
            .update_treatment_status("p2", "d1", TreatmentStatus::Completed, None)
            .await
            .unwrap();

        let all = f.patients.doctor_patients("d1", false).await.unwrap();
        assert_eq!(all.len(), 2);
        let current = f.patients.doctor_patients("d1", true).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].patient.patient_id, "p1");

        let statuses = f.patients.patients_status().await.unwrap();
        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0].treatment_status, Some(TreatmentStatus::Ongoing));
        assert_eq!(statuses[1].treatment_status, Some(TreatmentStatus::Completed));
        assert_eq!(statuses[2].doctor_id.as_deref(), Some("d2"));
        assert_eq!(statuses[3].treatment_status, None);
    }

    #[tokio::test]
    async fn test_treatment_updates_require_known_disease() {
        let f = fixture().await;
        f.patients.register_patient(&simple("p1", "d1")).await.unwrap();

        let result = f
            .patients
            .update_treatment_status("p1", "d1", TreatmentStatus::Completed, Some("ghost"))
            .await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));

        let patch = TreatmentPatch {
            diagnosed_with_disease: Some(true),
            diagnosed_disease_id: Some("ghost".to_string()),
            ..Default::default()
        };
        let result = f.patients.update_treatment("p1", "d1", &patch).await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));

        let relation = f.relationships.ongoing_relation("d1", "p1").await.unwrap().unwrap();
        assert!(!relation.diagnosed_with_disease);
    }
}
