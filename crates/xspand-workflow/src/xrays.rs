//! X 光检查管理
//!
//! 上传、审核、按需分类。审核时若批准 AI 结果则交给 `DiagnosisLinker`。

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use xspand_classifier::{ClassificationOutcome, ClassifierAdapter, ClassifierStage, ImageSource};
use xspand_core::utils::Validate;
use xspand_core::{NewXRayScan, Result, XRayScan, XRayScanPatch};
use xspand_database::RecordStore;

use crate::diagnosis::DiagnosisLinker;

/// 上传并分类的结果
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedScan {
    pub scan: XRayScan,
    pub classification: ClassificationOutcome,
}

/// 对已有检查分类的结果
#[derive(Debug, Clone, Serialize)]
pub struct ScanClassification {
    pub scan_id: String,
    pub classification: ClassificationOutcome,
    /// 结果是否已写回检查记录
    pub persisted: bool,
}

pub struct XRayService {
    records: RecordStore,
    linker: DiagnosisLinker,
    classifier: Option<Arc<ClassifierAdapter>>,
}

impl XRayService {
    pub fn new(records: RecordStore, linker: DiagnosisLinker, classifier: Option<Arc<ClassifierAdapter>>) -> Self {
        if classifier.is_none() {
            tracing::warn!("No classifier configured, classification requests will fail");
        }
        Self {
            records,
            linker,
            classifier,
        }
    }

    pub fn classifier_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub async fn add_scan(&self, new_scan: NewXRayScan) -> Result<XRayScan> {
        new_scan.validate()?;
        let scan = new_scan.into_scan(self.records.generate_id(), Utc::now());
        self.records.create(&scan).await?;

        tracing::info!("Added X-ray scan {} for patient {}", scan.scan_id, scan.patient_id);
        Ok(scan)
    }

    /// 上传前先分类；分类失败时仍然保存检查，分类字段留空
    pub async fn add_scan_classified(&self, new_scan: NewXRayScan) -> Result<ClassifiedScan> {
        new_scan.validate()?;
        let source = ImageSource::remote(&new_scan.image_url)?;
        let classification = self.classify(&source).await;

        let mut scan = new_scan.into_scan(self.records.generate_id(), Utc::now());
        if let Some(result) = classification.classification() {
            scan.ai_classification = Some(result.labels_joined());
            scan.ai_confidence_scores = Some(result.confidences_joined());
        }
        self.records.create(&scan).await?;

        tracing::info!(
            "Added X-ray scan {} with classification {:?}",
            scan.scan_id,
            scan.ai_classification
        );
        Ok(ClassifiedScan { scan, classification })
    }

    /// 审核更新；`ai_approved=true` 时走诊断关联流程
    pub async fn update_scan(&self, scan_id: &str, patch: &XRayScanPatch) -> Result<XRayScan> {
        if patch.is_approval() {
            return Ok(self.linker.approve(scan_id, patch).await?.scan);
        }

        patch.validate()?;
        let scan = self.records.update::<XRayScan, _>(scan_id, patch).await?;
        tracing::info!("Updated X-ray scan {}", scan_id);
        Ok(scan)
    }

    pub async fn get_scan(&self, scan_id: &str) -> Result<XRayScan> {
        self.records.get(scan_id).await
    }

    pub async fn list_scans(&self) -> Result<Vec<XRayScan>> {
        self.records.list().await
    }

    /// 尚未被放射科医生审核的检查
    pub async fn unverified_scans(&self) -> Result<Vec<XRayScan>> {
        let mut scans = self.list_scans().await?;
        scans.retain(XRayScan::is_unverified);
        Ok(scans)
    }

    pub async fn scans_for_patient(&self, patient_id: &str) -> Result<Vec<XRayScan>> {
        let mut scans = self.list_scans().await?;
        scans.retain(|scan| scan.patient_id == patient_id);
        scans.sort_by_key(|scan| scan.scan_timestamp);
        Ok(scans)
    }

    pub async fn delete_scan(&self, scan_id: &str) -> Result<()> {
        self.records.get::<XRayScan>(scan_id).await?;
        self.records.delete::<XRayScan>(scan_id).await?;
        tracing::info!("Deleted X-ray scan {}", scan_id);
        Ok(())
    }

    /// 对已存储的检查分类，`persist` 时把成功结果写回
    pub async fn classify_scan(&self, scan_id: &str, persist: bool) -> Result<ScanClassification> {
        let mut scan = self.records.get::<XRayScan>(scan_id).await?;
        // 早期记录可能存的不是 URL，按下载失败处理
        let classification = match ImageSource::remote(&scan.image_url) {
            Ok(source) => self.classify(&source).await,
            Err(e) => ClassificationOutcome::Failed {
                stage: ClassifierStage::Fetching,
                reason: e.to_string(),
            },
        };

        let persisted = match classification.classification() {
            Some(result) if persist => {
                scan.ai_classification = Some(result.labels_joined());
                scan.ai_confidence_scores = Some(result.confidences_joined());
                self.records.put(&scan).await?;
                true
            }
            _ => false,
        };

        Ok(ScanClassification {
            scan_id: scan.scan_id,
            classification,
            persisted,
        })
    }

    /// 对任意影像 URL 分类；非 `http(s)` 引用按校验错误拒绝
    pub async fn classify_url(&self, image_url: &str) -> Result<ClassificationOutcome> {
        let source = ImageSource::remote(image_url)?;
        Ok(self.classify(&source).await)
    }

    async fn classify(&self, source: &ImageSource) -> ClassificationOutcome {
        match &self.classifier {
            Some(classifier) => classifier.classify(source).await,
            None => ClassificationOutcome::unavailable(),
        }
    }
}
