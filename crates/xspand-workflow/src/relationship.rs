//! 医患关系管理
//!
//! 保证同一医生/患者对同时最多只有一条进行中的治疗关系，并负责状态切换。
//! 同一医患对的所有写操作在进程内串行执行。

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use xspand_core::utils::{pair_key, relation_key};
use xspand_core::{DoctorPatientRelation, Result, TreatmentPatch, TreatmentStatus, XspandError};
use xspand_database::RecordStore;

/// 注册医患关系的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "relation", rename_all = "snake_case")]
pub enum RelationRegistration {
    /// 已有进行中的关系，原样返回
    Existing(DoctorPatientRelation),
    /// 新建了一条进行中的关系
    Created(DoctorPatientRelation),
}

impl RelationRegistration {
    pub fn relation(&self) -> &DoctorPatientRelation {
        match self {
            RelationRegistration::Existing(relation) | RelationRegistration::Created(relation) => relation,
        }
    }

    pub fn into_relation(self) -> DoctorPatientRelation {
        match self {
            RelationRegistration::Existing(relation) | RelationRegistration::Created(relation) => relation,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, RelationRegistration::Created(_))
    }
}

/// 按医患对分配的异步锁
#[derive(Debug, Default)]
struct PairLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PairLocks {
    async fn acquire(&self, doctor_id: &str, patient_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(pair_key(doctor_id, patient_id)).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// 医患关系管理器
pub struct RelationshipManager {
    records: RecordStore,
    locks: PairLocks,
}

impl RelationshipManager {
    pub fn new(records: RecordStore) -> Self {
        Self {
            records,
            locks: PairLocks::default(),
        }
    }

    /// 建立治疗关系；已有进行中的关系时不做任何修改
    pub async fn register(&self, doctor_id: &str, patient_id: &str) -> Result<RelationRegistration> {
        let _guard = self.locks.acquire(doctor_id, patient_id).await;

        let relations = self.relations_for_pair(doctor_id, patient_id).await?;
        if let Some(ongoing) = relations.iter().find(|r| r.is_ongoing()) {
            tracing::debug!("Ongoing relation {} already exists", ongoing.relation_id);
            return Ok(RelationRegistration::Existing(ongoing.clone()));
        }

        let mut ordinal = relations
            .iter()
            .filter_map(|r| relation_ordinal(&r.relation_id, doctor_id, patient_id))
            .max()
            .unwrap_or(0)
            + 1;
        let mut relation_id = relation_key(doctor_id, patient_id, ordinal);
        // 不同医患对拼出的键可能相同
        while self.records.exists::<DoctorPatientRelation>(&relation_id).await? {
            ordinal += 1;
            relation_id = relation_key(doctor_id, patient_id, ordinal);
        }

        let relation = DoctorPatientRelation::ongoing(relation_id, doctor_id, patient_id, Utc::now());
        self.records.create(&relation).await?;

        tracing::info!(
            "Registered relation {} between doctor {} and patient {}",
            relation.relation_id,
            doctor_id,
            patient_id
        );
        Ok(RelationRegistration::Created(relation))
    }

    /// 修改医患对当前关系的状态，可同时记录诊断
    pub async fn update_status(
        &self,
        doctor_id: &str,
        patient_id: &str,
        status: TreatmentStatus,
        disease_id: Option<&str>,
    ) -> Result<DoctorPatientRelation> {
        let _guard = self.locks.acquire(doctor_id, patient_id).await;

        let relations = self.relations_for_pair(doctor_id, patient_id).await?;
        let mut relation = select_current(relations).ok_or_else(|| missing_pair(doctor_id, patient_id))?;

        relation.set_status(status, Utc::now());
        if let Some(disease_id) = disease_id {
            relation.link_diagnosis(disease_id);
        }
        self.records.put(&relation).await?;

        tracing::info!(
            "Relation {} status set to {:?}",
            relation.relation_id,
            relation.treatment_status
        );
        Ok(relation)
    }

    /// 更新医患对当前关系的治疗信息
    pub async fn update_treatment(
        &self,
        patient_id: &str,
        doctor_id: &str,
        patch: &TreatmentPatch,
    ) -> Result<DoctorPatientRelation> {
        let _guard = self.locks.acquire(doctor_id, patient_id).await;

        let relations = self.relations_for_pair(doctor_id, patient_id).await?;
        let relation = select_current(relations).ok_or_else(|| missing_pair(doctor_id, patient_id))?;

        let updated: DoctorPatientRelation = self.records.update(&relation.relation_id, patch).await?;
        tracing::info!("Updated treatment {}", updated.relation_id);
        Ok(updated)
    }

    /// 为某条进行中的关系记录诊断；关系已结束时不修改，返回 `None`
    pub(crate) async fn link_ongoing_diagnosis(
        &self,
        doctor_id: &str,
        patient_id: &str,
        disease_id: &str,
    ) -> Result<Option<DoctorPatientRelation>> {
        let _guard = self.locks.acquire(doctor_id, patient_id).await;

        let relations = self.relations_for_pair(doctor_id, patient_id).await?;
        let Some(mut relation) = relations.into_iter().find(|r| r.is_ongoing()) else {
            return Ok(None);
        };

        relation.link_diagnosis(disease_id);
        self.records.put(&relation).await?;
        Ok(Some(relation))
    }

    pub async fn relations(&self) -> Result<Vec<DoctorPatientRelation>> {
        self.records.list::<DoctorPatientRelation>().await
    }

    pub async fn relations_for_pair(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> Result<Vec<DoctorPatientRelation>> {
        let mut relations = self.relations().await?;
        relations.retain(|r| r.involves(doctor_id, patient_id));
        Ok(relations)
    }

    pub async fn relations_for_patient(&self, patient_id: &str) -> Result<Vec<DoctorPatientRelation>> {
        let mut relations = self.relations().await?;
        relations.retain(|r| r.patient_id == patient_id);
        Ok(relations)
    }

    pub async fn relations_for_doctor(&self, doctor_id: &str) -> Result<Vec<DoctorPatientRelation>> {
        let mut relations = self.relations().await?;
        relations.retain(|r| r.doctor_id == doctor_id);
        Ok(relations)
    }

    pub async fn ongoing_relation(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> Result<Option<DoctorPatientRelation>> {
        let relations = self.relations_for_pair(doctor_id, patient_id).await?;
        Ok(relations.into_iter().find(|r| r.is_ongoing()))
    }

    /// 医患对的当前关系：进行中的优先，否则取最近结束的
    pub async fn current_relation(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> Result<Option<DoctorPatientRelation>> {
        Ok(select_current(self.relations_for_pair(doctor_id, patient_id).await?))
    }

    /// 删除患者的全部关系，返回删除条数
    pub async fn delete_for_patient(&self, patient_id: &str) -> Result<usize> {
        let relations = self.relations_for_patient(patient_id).await?;
        self.delete_all(relations).await
    }

    /// 删除医生的全部关系，返回删除条数
    pub async fn delete_for_doctor(&self, doctor_id: &str) -> Result<usize> {
        let relations = self.relations_for_doctor(doctor_id).await?;
        self.delete_all(relations).await
    }

    async fn delete_all(&self, relations: Vec<DoctorPatientRelation>) -> Result<usize> {
        let count = relations.len();
        for relation in relations {
            let _guard = self.locks.acquire(&relation.doctor_id, &relation.patient_id).await;
            self.records
                .delete::<DoctorPatientRelation>(&relation.relation_id)
                .await?;
        }
        Ok(count)
    }
}

fn missing_pair(doctor_id: &str, patient_id: &str) -> XspandError {
    XspandError::NotFound(format!(
        "Treatment relation not found for doctor {} and patient {}",
        doctor_id, patient_id
    ))
}

fn relation_ordinal(relation_id: &str, doctor_id: &str, patient_id: &str) -> Option<usize> {
    relation_id
        .strip_prefix(&pair_key(doctor_id, patient_id))?
        .strip_prefix('_')?
        .parse()
        .ok()
}

/// 进行中的关系优先；否则按结束时间、开始时间、关系 ID 依次取最大
fn select_current(relations: Vec<DoctorPatientRelation>) -> Option<DoctorPatientRelation> {
    if let Some(ongoing) = relations.iter().find(|r| r.is_ongoing()) {
        return Some(ongoing.clone());
    }
    relations.into_iter().max_by(completed_order)
}

fn completed_order(a: &DoctorPatientRelation, b: &DoctorPatientRelation) -> Ordering {
    a.treatment_end_date
        .cmp(&b.treatment_end_date)
        .then(a.treatment_start_date.cmp(&b.treatment_start_date))
        .then_with(|| a.relation_id.cmp(&b.relation_id))
}
