//! # Xspand工作流模块
//!
//! 医疗记录的业务规则层：
//! - 医患关系管理：同一医患对最多一条进行中的治疗关系，状态切换与历史保留
//! - 诊断关联：批准 AI 分类结果时解析疾病并同步到进行中的关系
//! - 实体服务：医生/放射科医生、患者、疾病、X 光检查的增删改查与级联

pub mod diagnosis;
pub mod diseases;
pub mod engine;
pub mod patients;
pub mod relationship;
pub mod users;
pub mod xrays;

// 重新导出主要类型
pub use diagnosis::{DiagnosisLink, DiagnosisLinker};
pub use diseases::{DiseasePatientCount, DiseaseService};
pub use engine::WorkflowEngine;
pub use patients::{
    CurrentTreatment, DoctorPatientEntry, Lookup, PatientDetails, PatientService, PatientStatus,
    RegistrationOutcome,
};
pub use relationship::{RelationRegistration, RelationshipManager};
pub use users::UserService;
pub use xrays::{ClassifiedScan, ScanClassification, XRayService};
