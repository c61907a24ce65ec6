//! 诊断关联
//!
//! 放射科医生批准 AI 分类结果时，把标签解析为疾病 ID，写入检查记录，
//! 并同步到该检查对应的进行中医患关系。

use std::sync::Arc;

use serde::Serialize;
use xspand_core::utils::Validate;
use xspand_core::{Disease, DoctorPatientRelation, Result, XRayScan, XRayScanPatch, XspandError};
use xspand_database::RecordStore;

use crate::diseases::disease_by_name;
use crate::relationship::RelationshipManager;

/// 一次批准的结果
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisLink {
    pub scan: XRayScan,
    pub disease: Disease,
    /// 被同步的进行中关系；关系已结束或不存在时为空
    pub relation: Option<DoctorPatientRelation>,
}

pub struct DiagnosisLinker {
    records: RecordStore,
    relationships: Arc<RelationshipManager>,
}

impl DiagnosisLinker {
    pub fn new(records: RecordStore, relationships: Arc<RelationshipManager>) -> Self {
        Self {
            records,
            relationships,
        }
    }

    /// 批准检查的分类结果
    ///
    /// 标签取补丁里的 `ai_classification`，否则取已存储的值。检查记录缺失、
    /// 标签缺失或没有同名疾病时直接失败，此时检查和关系都不会被修改。
    pub async fn approve(&self, scan_id: &str, patch: &XRayScanPatch) -> Result<DiagnosisLink> {
        patch.validate()?;
        let current = self.records.get::<XRayScan>(scan_id).await?;

        let label = patch
            .ai_classification
            .clone()
            .or_else(|| current.ai_classification.clone())
            .filter(|label| !label.trim().is_empty())
            .ok_or_else(|| {
                XspandError::Validation(format!(
                    "X-ray scan {} has no classification to approve",
                    scan_id
                ))
            })?;

        let disease = disease_by_name(&self.records, &label)
            .await?
            .ok_or_else(|| XspandError::NotFound(format!("Disease with name {} not found", label)))?;

        let mut approval = patch.clone();
        approval.ai_approved = Some(true);
        approval.ai_classification = Some(label.clone());
        approval.no_findings_detected = Some(false);
        approval.disease_name = Some(label);
        approval.disease_id = Some(disease.disease_id.clone());

        let scan: XRayScan = self.records.update(scan_id, &approval).await?;

        let relation = self
            .relationships
            .link_ongoing_diagnosis(&scan.doctor_id, &scan.patient_id, &disease.disease_id)
            .await?;
        match &relation {
            Some(relation) => tracing::info!(
                "Scan {} approved as {}, relation {} updated",
                scan_id,
                disease.disease_name,
                relation.relation_id
            ),
            None => tracing::info!(
                "Scan {} approved as {}, no ongoing relation to update",
                scan_id,
                disease.disease_name
            ),
        }

        Ok(DiagnosisLink {
            scan,
            disease,
            relation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use xspand_core::{NewXRayScan, SeverityLevel, TreatmentStatus};

    struct Fixture {
        records: RecordStore,
        relationships: Arc<RelationshipManager>,
        linker: DiagnosisLinker,
    }

    fn fixture() -> Fixture {
        let records = RecordStore::in_memory();
        let relationships = Arc::new(RelationshipManager::new(records.clone()));
        let linker = DiagnosisLinker::new(records.clone(), relationships.clone());
        Fixture {
            records,
            relationships,
            linker,
        }
    }

    async fn seed(records: &RecordStore, classification: Option<&str>) -> (Disease, XRayScan) {
        let disease = Disease {
            disease_id: "disease-pneumonia".to_string(),
            disease_name: "Pneumonia".to_string(),
            description: "infection".to_string(),
            severity_level: SeverityLevel::Severe,
            common_symptoms: vec![],
            treatment_methods: vec![],
        };
        records.create(&disease).await.unwrap();

        let scan = NewXRayScan {
            image_url: "https://images.example.com/1.png".to_string(),
            patient_id: "p1".to_string(),
            doctor_id: "d1".to_string(),
            radiologist_id: None,
            radiologist_report: None,
            ai_classification: classification.map(str::to_string),
            no_findings_detected: None,
            scan_timestamp: None,
        }
        .into_scan("scan-1".to_string(), Utc::now());
        records.create(&scan).await.unwrap();
        (disease, scan)
    }

    fn approval() -> XRayScanPatch {
        XRayScanPatch {
            radiologist_id: Some("r1".to_string()),
            ai_approved: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_approval_links_disease_and_ongoing_relation() {
        let f = fixture();
        let (disease, _) = seed(&f.records, Some("Pneumonia")).await;
        f.relationships.register("d1", "p1").await.unwrap();

        let link = f.linker.approve("scan-1", &approval()).await.unwrap();

        assert_eq!(link.scan.disease_id.as_deref(), Some(disease.disease_id.as_str()));
        assert_eq!(link.scan.disease_name.as_deref(), Some("Pneumonia"));
        assert_eq!(link.scan.no_findings_detected, Some(false));
        assert!(link.scan.ai_approved);
        assert_eq!(link.scan.radiologist_id.as_deref(), Some("r1"));

        let relation = f.relationships.ongoing_relation("d1", "p1").await.unwrap().unwrap();
        assert!(relation.diagnosed_with_disease);
        assert_eq!(relation.diagnosed_disease_id, link.scan.disease_id);
        assert_eq!(link.relation, Some(relation));
    }

    #[tokio::test]
    async fn test_approval_uses_label_from_patch() {
        let f = fixture();
        seed(&f.records, Some("Edema")).await;

        let patch = XRayScanPatch {
            ai_classification: Some("Pneumonia".to_string()),
            ..approval()
        };
        let link = f.linker.approve("scan-1", &patch).await.unwrap();
        assert_eq!(link.scan.ai_classification.as_deref(), Some("Pneumonia"));
        assert!(link.relation.is_none());
    }

    #[tokio::test]
    async fn test_unknown_label_leaves_scan_and_relation_untouched() {
        let f = fixture();
        let (_, scan) = seed(&f.records, Some("Nodule")).await;
        let before = f.relationships.register("d1", "p1").await.unwrap().into_relation();

        let result = f.linker.approve("scan-1", &approval()).await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));

        assert_eq!(f.records.get::<XRayScan>("scan-1").await.unwrap(), scan);
        let after = f.relationships.ongoing_relation("d1", "p1").await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_completed_relation_is_not_updated() {
        let f = fixture();
        seed(&f.records, Some("Pneumonia")).await;
        f.relationships.register("d1", "p1").await.unwrap();
        f.relationships
            .update_status("d1", "p1", TreatmentStatus::Completed, None)
            .await
            .unwrap();

        let link = f.linker.approve("scan-1", &approval()).await.unwrap();
        assert!(link.relation.is_none());

        let relation = f.relationships.current_relation("d1", "p1").await.unwrap().unwrap();
        assert!(!relation.diagnosed_with_disease);
    }

    #[tokio::test]
    async fn test_approval_without_label_is_rejected() {
        let f = fixture();
        seed(&f.records, None).await;

        let result = f.linker.approve("scan-1", &approval()).await;
        assert!(matches!(result, Err(XspandError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_scan_is_not_found() {
        let f = fixture();
        let result = f.linker.approve("nope", &approval()).await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));
    }
}
