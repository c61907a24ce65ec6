//! 疾病管理

use std::sync::Arc;

use serde::Serialize;
use xspand_core::utils::{generate_id, Validate};
use xspand_core::{Disease, DiseasePatch, NewDisease, Result, XspandError};
use xspand_database::RecordStore;

use crate::relationship::RelationshipManager;

/// 某个疾病关联的患者数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseasePatientCount {
    pub disease_id: String,
    pub disease_name: String,
    pub patient_count: usize,
}

/// 按名称精确查找疾病
pub(crate) async fn disease_by_name(records: &RecordStore, name: &str) -> Result<Option<Disease>> {
    let diseases = records.list::<Disease>().await?;
    Ok(diseases.into_iter().find(|d| d.disease_name == name))
}

pub struct DiseaseService {
    records: RecordStore,
    relationships: Arc<RelationshipManager>,
}

impl DiseaseService {
    pub fn new(records: RecordStore, relationships: Arc<RelationshipManager>) -> Self {
        Self {
            records,
            relationships,
        }
    }

    pub async fn add_disease(&self, new_disease: NewDisease) -> Result<Disease> {
        new_disease.validate()?;
        let disease = new_disease.into_disease(generate_id());
        self.ensure_name_available(&disease.disease_name, None).await?;

        self.records.create(&disease).await?;
        tracing::info!("Added disease {} ({})", disease.disease_name, disease.disease_id);
        Ok(disease)
    }

    pub async fn update_disease(&self, disease_id: &str, patch: &DiseasePatch) -> Result<Disease> {
        patch.validate()?;

        let mut patch = patch.clone();
        if let Some(name) = patch.disease_name.as_mut() {
            *name = name.trim().to_string();
            self.ensure_name_available(name, Some(disease_id)).await?;
        }

        let disease: Disease = self.records.update(disease_id, &patch).await?;
        tracing::info!("Updated disease {}", disease_id);
        Ok(disease)
    }

    pub async fn delete_disease(&self, disease_id: &str) -> Result<()> {
        self.records.get::<Disease>(disease_id).await?;
        self.records.delete::<Disease>(disease_id).await?;
        tracing::info!("Deleted disease {}", disease_id);
        Ok(())
    }

    pub async fn get_disease(&self, disease_id: &str) -> Result<Disease> {
        self.records.get(disease_id).await
    }

    pub async fn list_diseases(&self) -> Result<Vec<Disease>> {
        self.records.list().await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Disease>> {
        disease_by_name(&self.records, name).await
    }

    /// 统计每个疾病被诊断的次数，`ongoing_only` 时只计进行中的关系
    pub async fn disease_patient_counts(&self, ongoing_only: bool) -> Result<Vec<DiseasePatientCount>> {
        let diseases = self.list_diseases().await?;
        let relations = self.relationships.relations().await?;

        let counts = diseases
            .into_iter()
            .map(|disease| {
                let patient_count = relations
                    .iter()
                    .filter(|r| r.diagnosed_disease_id.as_deref() == Some(disease.disease_id.as_str()))
                    .filter(|r| !ongoing_only || r.is_ongoing())
                    .count();
                DiseasePatientCount {
                    disease_id: disease.disease_id,
                    disease_name: disease.disease_name,
                    patient_count,
                }
            })
            .collect();
        Ok(counts)
    }

    async fn ensure_name_available(&self, name: &str, except_id: Option<&str>) -> Result<()> {
        match self.find_by_name(name).await? {
            Some(existing) if Some(existing.disease_id.as_str()) != except_id => Err(XspandError::Validation(
                format!("Disease with name {} already exists", name),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xspand_core::{SeverityLevel, TreatmentStatus};

    fn service() -> (DiseaseService, Arc<RelationshipManager>) {
        let records = RecordStore::in_memory();
        let relationships = Arc::new(RelationshipManager::new(records.clone()));
        (DiseaseService::new(records, relationships.clone()), relationships)
    }

    fn new_disease(name: &str) -> NewDisease {
        NewDisease {
            disease_name: name.to_string(),
            description: "lung disease".to_string(),
            severity_level: SeverityLevel::Severe,
            common_symptoms: vec!["cough".to_string()],
            treatment_methods: vec!["antibiotics".to_string()],
        }
    }

    #[tokio::test]
    async fn test_add_and_get_disease() {
        let (service, _) = service();
        let disease = service.add_disease(new_disease(" Pneumonia ")).await.unwrap();

        assert_eq!(disease.disease_name, "Pneumonia");
        assert_eq!(service.get_disease(&disease.disease_id).await.unwrap(), disease);
        assert!(service.find_by_name("Pneumonia").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disease_names_are_unique() {
        let (service, _) = service();
        service.add_disease(new_disease("Pneumonia")).await.unwrap();
        let edema = service.add_disease(new_disease("Edema")).await.unwrap();

        let duplicate = service.add_disease(new_disease("Pneumonia")).await;
        assert!(matches!(duplicate, Err(XspandError::Validation(_))));

        let rename = DiseasePatch {
            disease_name: Some("Pneumonia".to_string()),
            ..Default::default()
        };
        let result = service.update_disease(&edema.disease_id, &rename).await;
        assert!(matches!(result, Err(XspandError::Validation(_))));

        // 改成自己的名字不算冲突
        let same = DiseasePatch {
            disease_name: Some("Edema".to_string()),
            description: Some("fluid".to_string()),
            ..Default::default()
        };
        let updated = service.update_disease(&edema.disease_id, &same).await.unwrap();
        assert_eq!(updated.description, "fluid");
    }

    #[tokio::test]
    async fn test_delete_missing_disease_is_not_found() {
        let (service, _) = service();
        let result = service.delete_disease("missing").await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disease_patient_counts() {
        let (service, relationships) = service();
        let pneumonia = service.add_disease(new_disease("Pneumonia")).await.unwrap();
        service.add_disease(new_disease("Edema")).await.unwrap();

        relationships.register("d1", "p1").await.unwrap();
        relationships.register("d1", "p2").await.unwrap();
        relationships
            .update_status("d1", "p1", TreatmentStatus::Ongoing, Some(&pneumonia.disease_id))
            .await
            .unwrap();
        relationships
            .update_status("d1", "p2", TreatmentStatus::Completed, Some(&pneumonia.disease_id))
            .await
            .unwrap();

        let all = service.disease_patient_counts(false).await.unwrap();
        let count = |counts: &[DiseasePatientCount], name: &str| {
            counts.iter().find(|c| c.disease_name == name).unwrap().patient_count
        };
        assert_eq!(count(&all, "Pneumonia"), 2);
        assert_eq!(count(&all, "Edema"), 0);

        let current = service.disease_patient_counts(true).await.unwrap();
        assert_eq!(count(&current, "Pneumonia"), 1);
    }
}
