//! 工作流引擎
//!
//! 把记录存储、认证服务和分类器组装成各个实体服务，共享同一个 `RelationshipManager`。

use std::sync::Arc;

use xspand_classifier::ClassifierAdapter;
use xspand_database::RecordStore;
use xspand_integration::AuthProvider;

use crate::diagnosis::DiagnosisLinker;
use crate::diseases::DiseaseService;
use crate::patients::PatientService;
use crate::relationship::RelationshipManager;
use crate::users::UserService;
use crate::xrays::XRayService;

/// 工作流引擎
pub struct WorkflowEngine {
    pub users: UserService,
    pub patients: PatientService,
    pub diseases: DiseaseService,
    pub xrays: XRayService,
    pub relationships: Arc<RelationshipManager>,
}

impl WorkflowEngine {
    pub fn new(
        records: RecordStore,
        auth: Arc<dyn AuthProvider>,
        classifier: Option<Arc<ClassifierAdapter>>,
    ) -> Self {
        let relationships = Arc::new(RelationshipManager::new(records.clone()));
        let linker = DiagnosisLinker::new(records.clone(), relationships.clone());

        tracing::info!(
            "Workflow engine ready (classifier {})",
            if classifier.is_some() { "loaded" } else { "disabled" }
        );

        Self {
            users: UserService::new(records.clone(), relationships.clone(), auth),
            patients: PatientService::new(records.clone(), relationships.clone()),
            diseases: DiseaseService::new(records.clone(), relationships.clone()),
            xrays: XRayService::new(records, linker, classifier),
            relationships,
        }
    }
}
