//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XspandError};
use crate::utils::{require_non_empty, validate_email, Validate};

/// 文档存储中的集合名称
pub mod collections {
    pub const DOCTORS: &str = "doctors";
    pub const RADIOLOGISTS: &str = "radiologists";
    pub const PATIENTS: &str = "patients";
    pub const DISEASES: &str = "diseases";
    pub const RELATIONS: &str = "doctor_patient_relations";
    pub const XRAY_SCANS: &str = "xray_scans";
}

/// 可持久化到某个集合的实体
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// 所属集合
    const COLLECTION: &'static str;
    /// 用于错误信息的实体名称
    const KIND: &'static str;

    /// 文档主键
    fn record_id(&self) -> &str;
}

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Doctor,
    Radiologist,
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// 治疗状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TreatmentStatus {
    Ongoing,   // 治疗中
    Completed, // 已结束
}

/// 疾病严重程度，序列化为 1-4 的整数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum SeverityLevel {
    Mild = 1,
    Moderate = 2,
    Severe = 3,
    Critical = 4,
}

impl TryFrom<u8> for SeverityLevel {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(SeverityLevel::Mild),
            2 => Ok(SeverityLevel::Moderate),
            3 => Ok(SeverityLevel::Severe),
            4 => Ok(SeverityLevel::Critical),
            other => Err(format!("severity level must be between 1 and 4, got {}", other)),
        }
    }
}

impl From<SeverityLevel> for u8 {
    fn from(level: SeverityLevel) -> Self {
        level as u8
    }
}

// ---------------------------------------------------------------------------
// 医护人员
// ---------------------------------------------------------------------------

/// 医生
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: String,
    pub specialization: String,
}

impl Record for Doctor {
    const COLLECTION: &'static str = collections::DOCTORS;
    const KIND: &'static str = "Doctor";

    fn record_id(&self) -> &str {
        &self.user_id
    }
}

/// 放射科医生
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Radiologist {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: String,
    pub specialization: String,
}

impl Record for Radiologist {
    const COLLECTION: &'static str = collections::RADIOLOGISTS;
    const KIND: &'static str = "Radiologist";

    fn record_id(&self) -> &str {
        &self.user_id
    }
}

/// 医生/放射科医生注册请求，密码只交给认证服务，不落库
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaffRegistration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub specialization: String,
}

impl Validate for StaffRegistration {
    fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        require_non_empty("full_name", &self.full_name)?;
        require_non_empty("specialization", &self.specialization)?;
        if self.password.chars().count() < 6 {
            return Err(XspandError::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// 医护人员资料的部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaffPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

pub type DoctorPatch = StaffPatch;
pub type RadiologistPatch = StaffPatch;

impl Validate for StaffPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.full_name {
            require_non_empty("full_name", name)?;
        }
        if let Some(specialization) = &self.specialization {
            require_non_empty("specialization", specialization)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 患者
// ---------------------------------------------------------------------------

/// 患者基本信息，除 ID 和常住标记外均可缺省（简易注册只带这两项）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub patient_id: String,
    pub is_resident: bool,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

impl Patient {
    /// 简易注册时创建的最小患者记录
    pub fn minimal(patient_id: impl Into<String>, is_resident: bool) -> Self {
        Self {
            patient_id: patient_id.into(),
            is_resident,
            full_name: None,
            email_address: None,
            contact_number: None,
            age: None,
            height_cm: None,
            weight_kg: None,
            gender: None,
        }
    }
}

impl Record for Patient {
    const COLLECTION: &'static str = collections::PATIENTS;
    const KIND: &'static str = "Patient";

    fn record_id(&self) -> &str {
        &self.patient_id
    }
}

/// 简易注册：只登记 ID 与常住标记，并建立医患关系
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimplePatientRegistration {
    pub patient_id: String,
    pub doctor_id: String,
    pub is_resident: bool,
}

impl Validate for SimplePatientRegistration {
    fn validate(&self) -> Result<()> {
        require_non_empty("patient_id", &self.patient_id)?;
        require_non_empty("doctor_id", &self.doctor_id)
    }
}

/// 完整注册
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletePatientRegistration {
    pub patient_id: String,
    pub doctor_id: String,
    pub full_name: String,
    pub is_resident: bool,
    pub email_address: String,
    pub contact_number: String,
    pub age: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub gender: Gender,
}

impl CompletePatientRegistration {
    pub fn to_patient(&self) -> Patient {
        Patient {
            patient_id: self.patient_id.clone(),
            is_resident: self.is_resident,
            full_name: Some(self.full_name.clone()),
            email_address: Some(self.email_address.clone()),
            contact_number: Some(self.contact_number.clone()),
            age: Some(self.age),
            height_cm: Some(self.height_cm),
            weight_kg: Some(self.weight_kg),
            gender: Some(self.gender),
        }
    }
}

impl Validate for CompletePatientRegistration {
    fn validate(&self) -> Result<()> {
        require_non_empty("patient_id", &self.patient_id)?;
        require_non_empty("doctor_id", &self.doctor_id)?;
        require_non_empty("full_name", &self.full_name)?;
        require_non_empty("contact_number", &self.contact_number)?;
        validate_email(&self.email_address)?;
        validate_body_measures(Some(self.age), Some(self.height_cm), Some(self.weight_kg))
    }
}

/// 患者资料的部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_resident: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl Validate for PatientPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.full_name {
            require_non_empty("full_name", name)?;
        }
        if let Some(email) = &self.email_address {
            validate_email(email)?;
        }
        validate_body_measures(self.age, self.height_cm, self.weight_kg)
    }
}

fn validate_body_measures(age: Option<u32>, height_cm: Option<f64>, weight_kg: Option<f64>) -> Result<()> {
    if matches!(age, Some(age) if age > 150) {
        return Err(XspandError::Validation("age must be at most 150".to_string()));
    }
    if matches!(height_cm, Some(h) if !(h > 0.0 && h.is_finite())) {
        return Err(XspandError::Validation("height_cm must be positive".to_string()));
    }
    if matches!(weight_kg, Some(w) if !(w > 0.0 && w.is_finite())) {
        return Err(XspandError::Validation("weight_kg must be positive".to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 疾病
// ---------------------------------------------------------------------------

/// 疾病信息，名称在诊断关联时作为查找键
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disease {
    pub disease_id: String,
    pub disease_name: String,
    pub description: String,
    pub severity_level: SeverityLevel,
    pub common_symptoms: Vec<String>,
    pub treatment_methods: Vec<String>,
}

impl Record for Disease {
    const COLLECTION: &'static str = collections::DISEASES;
    const KIND: &'static str = "Disease";

    fn record_id(&self) -> &str {
        &self.disease_id
    }
}

/// 新增疾病请求，ID 由服务端生成
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDisease {
    pub disease_name: String,
    pub description: String,
    pub severity_level: SeverityLevel,
    #[serde(default)]
    pub common_symptoms: Vec<String>,
    #[serde(default)]
    pub treatment_methods: Vec<String>,
}

impl NewDisease {
    pub fn into_disease(self, disease_id: String) -> Disease {
        Disease {
            disease_id,
            disease_name: self.disease_name.trim().to_string(),
            description: self.description,
            severity_level: self.severity_level,
            common_symptoms: self.common_symptoms,
            treatment_methods: self.treatment_methods,
        }
    }
}

impl Validate for NewDisease {
    fn validate(&self) -> Result<()> {
        require_non_empty("disease_name", &self.disease_name)
    }
}

/// 疾病的部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiseasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_level: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_symptoms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_methods: Option<Vec<String>>,
}

impl Validate for DiseasePatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.disease_name {
            require_non_empty("disease_name", name)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 医患关系
// ---------------------------------------------------------------------------

/// 医患治疗关系
///
/// 同一医生/患者对最多只有一条 `Ongoing` 关系；`treatment_end_date` 为空当且仅当状态为 `Ongoing`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorPatientRelation {
    pub relation_id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub treatment_status: TreatmentStatus,
    pub treatment_start_date: DateTime<Utc>,
    pub treatment_end_date: Option<DateTime<Utc>>,
    pub diagnosed_with_disease: bool,
    pub diagnosed_disease_id: Option<String>,
}

impl DoctorPatientRelation {
    /// 新建一条进行中的关系
    pub fn ongoing(relation_id: String, doctor_id: &str, patient_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            relation_id,
            doctor_id: doctor_id.to_string(),
            patient_id: patient_id.to_string(),
            treatment_status: TreatmentStatus::Ongoing,
            treatment_start_date: started_at,
            treatment_end_date: None,
            diagnosed_with_disease: false,
            diagnosed_disease_id: None,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.treatment_status == TreatmentStatus::Ongoing
    }

    pub fn involves(&self, doctor_id: &str, patient_id: &str) -> bool {
        self.doctor_id == doctor_id && self.patient_id == patient_id
    }

    /// 切换状态并维护结束时间
    pub fn set_status(&mut self, status: TreatmentStatus, now: DateTime<Utc>) {
        self.treatment_status = status;
        self.treatment_end_date = match status {
            TreatmentStatus::Completed => Some(now),
            TreatmentStatus::Ongoing => None,
        };
    }

    /// 记录诊断结果
    pub fn link_diagnosis(&mut self, disease_id: &str) {
        self.diagnosed_with_disease = true;
        self.diagnosed_disease_id = Some(disease_id.to_string());
    }
}

impl Record for DoctorPatientRelation {
    const COLLECTION: &'static str = collections::RELATIONS;
    const KIND: &'static str = "Doctor-patient relation";

    fn record_id(&self) -> &str {
        &self.relation_id
    }
}

/// 治疗记录的部分更新；状态与结束时间只能通过状态接口修改
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreatmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosed_with_disease: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosed_disease_id: Option<String>,
}

impl Validate for TreatmentPatch {
    fn validate(&self) -> Result<()> {
        if self.diagnosed_with_disease == Some(false) && self.diagnosed_disease_id.is_some() {
            return Err(XspandError::Validation(
                "diagnosed_disease_id requires diagnosed_with_disease".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// X 光片
// ---------------------------------------------------------------------------

/// X 光检查记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct XRayScan {
    pub scan_id: String,
    pub image_url: String,
    pub patient_id: String,
    pub doctor_id: String,
    #[serde(default)]
    pub radiologist_id: Option<String>,
    #[serde(default)]
    pub radiologist_report: Option<String>,
    #[serde(default)]
    pub ai_classification: Option<String>,
    #[serde(default)]
    pub ai_confidence_scores: Option<String>,
    #[serde(default)]
    pub ai_approved: bool,
    #[serde(default)]
    pub no_findings_detected: Option<bool>,
    #[serde(default)]
    pub disease_name: Option<String>,
    #[serde(default)]
    pub disease_id: Option<String>,
    pub scan_timestamp: DateTime<Utc>,
}

impl XRayScan {
    /// 尚未经放射科医生审核
    pub fn is_unverified(&self) -> bool {
        self.radiologist_id.is_none()
    }
}

impl Record for XRayScan {
    const COLLECTION: &'static str = collections::XRAY_SCANS;
    const KIND: &'static str = "X-ray scan";

    fn record_id(&self) -> &str {
        &self.scan_id
    }
}

/// 上传 X 光片请求
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewXRayScan {
    pub image_url: String,
    pub patient_id: String,
    pub doctor_id: String,
    #[serde(default)]
    pub radiologist_id: Option<String>,
    #[serde(default)]
    pub radiologist_report: Option<String>,
    #[serde(default)]
    pub ai_classification: Option<String>,
    #[serde(default)]
    pub no_findings_detected: Option<bool>,
    #[serde(default)]
    pub scan_timestamp: Option<DateTime<Utc>>,
}

impl NewXRayScan {
    pub fn into_scan(self, scan_id: String, now: DateTime<Utc>) -> XRayScan {
        XRayScan {
            scan_id,
            image_url: self.image_url,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            radiologist_id: self.radiologist_id,
            radiologist_report: self.radiologist_report,
            ai_classification: self.ai_classification,
            ai_confidence_scores: None,
            ai_approved: false,
            no_findings_detected: self.no_findings_detected,
            disease_name: None,
            disease_id: None,
            scan_timestamp: self.scan_timestamp.unwrap_or(now),
        }
    }
}

impl Validate for NewXRayScan {
    fn validate(&self) -> Result<()> {
        require_non_empty("image_url", &self.image_url)?;
        require_non_empty("patient_id", &self.patient_id)?;
        require_non_empty("doctor_id", &self.doctor_id)
    }
}

/// 放射科审核时对检查记录的部分更新
///
/// `disease_name`/`disease_id` 只由诊断关联流程写入，客户端无法直接设置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XRayScanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiologist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiologist_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_findings_detected: Option<bool>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub disease_name: Option<String>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<String>,
}

impl XRayScanPatch {
    pub fn is_approval(&self) -> bool {
        self.ai_approved == Some(true)
    }
}

impl Validate for XRayScanPatch {
    fn validate(&self) -> Result<()> {
        if let Some(radiologist_id) = &self.radiologist_id {
            require_non_empty("radiologist_id", radiologist_id)?;
        }
        Ok(())
    }
}
