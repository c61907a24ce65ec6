//! 医生与放射科医生账户管理

use std::sync::Arc;

use xspand_core::utils::Validate;
use xspand_core::{
    Doctor, DoctorPatch, Radiologist, RadiologistPatch, Record, Result, StaffRegistration, UserRole,
    XRayScan,
};
use xspand_database::RecordStore;
use xspand_integration::AuthProvider;

use crate::relationship::RelationshipManager;

pub struct UserService {
    records: RecordStore,
    relationships: Arc<RelationshipManager>,
    auth: Arc<dyn AuthProvider>,
}

impl UserService {
    pub fn new(
        records: RecordStore,
        relationships: Arc<RelationshipManager>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            records,
            relationships,
            auth,
        }
    }

    /// 注册医生：先在认证服务创建身份，再以其 ID 落库
    pub async fn register_doctor(&self, registration: &StaffRegistration) -> Result<Doctor> {
        let user_id = self.create_identity(registration).await?;
        let doctor = Doctor {
            user_id,
            email: registration.email.clone(),
            role: UserRole::Doctor,
            full_name: registration.full_name.clone(),
            specialization: registration.specialization.clone(),
        };
        self.records.create(&doctor).await?;

        tracing::info!("Registered doctor {} ({})", doctor.full_name, doctor.user_id);
        Ok(doctor)
    }

    pub async fn register_radiologist(&self, registration: &StaffRegistration) -> Result<Radiologist> {
        let user_id = self.create_identity(registration).await?;
        let radiologist = Radiologist {
            user_id,
            email: registration.email.clone(),
            role: UserRole::Radiologist,
            full_name: registration.full_name.clone(),
            specialization: registration.specialization.clone(),
        };
        self.records.create(&radiologist).await?;

        tracing::info!("Registered radiologist {} ({})", radiologist.full_name, radiologist.user_id);
        Ok(radiologist)
    }

    async fn create_identity(&self, registration: &StaffRegistration) -> Result<String> {
        registration.validate()?;
        self.auth
            .create_user(&registration.email, &registration.password)
            .await
    }

    pub async fn update_doctor(&self, doctor_id: &str, patch: &DoctorPatch) -> Result<Doctor> {
        self.update_staff(doctor_id, patch).await
    }

    pub async fn update_radiologist(&self, radiologist_id: &str, patch: &RadiologistPatch) -> Result<Radiologist> {
        self.update_staff(radiologist_id, patch).await
    }

    async fn update_staff<T: Record>(&self, user_id: &str, patch: &DoctorPatch) -> Result<T> {
        patch.validate()?;
        let updated = self.records.update::<T, _>(user_id, patch).await?;
        tracing::info!("Updated {} {}", T::KIND, user_id);
        Ok(updated)
    }

    pub async fn get_doctor(&self, doctor_id: &str) -> Result<Doctor> {
        self.records.get(doctor_id).await
    }

    pub async fn get_radiologist(&self, radiologist_id: &str) -> Result<Radiologist> {
        self.records.get(radiologist_id).await
    }

    pub async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        self.records.list().await
    }

    pub async fn list_radiologists(&self) -> Result<Vec<Radiologist>> {
        self.records.list().await
    }

    /// 删除医生：级联删除其全部医患关系，删除记录，最后吊销登录身份
    ///
    /// 返回删除的关系条数。中途失败时已完成的步骤不会回滚。
    pub async fn delete_doctor(&self, doctor_id: &str) -> Result<usize> {
        self.records.get::<Doctor>(doctor_id).await?;

        let removed = self.relationships.delete_for_doctor(doctor_id).await?;
        self.records.delete::<Doctor>(doctor_id).await?;
        self.auth.delete_user(doctor_id).await?;

        tracing::info!("Deleted doctor {} and {} relations", doctor_id, removed);
        Ok(removed)
    }

    /// 删除放射科医生：其审核过的检查回到未审核状态
    ///
    /// 返回被重置的检查数量。
    pub async fn delete_radiologist(&self, radiologist_id: &str) -> Result<usize> {
        self.records.get::<Radiologist>(radiologist_id).await?;

        let scans = self.records.list::<XRayScan>().await?;
        let mut reset = 0;
        for mut scan in scans {
            if scan.radiologist_id.as_deref() != Some(radiologist_id) {
                continue;
            }
            scan.radiologist_id = None;
            scan.radiologist_report = None;
            self.records.put(&scan).await?;
            reset += 1;
        }

        self.records.delete::<Radiologist>(radiologist_id).await?;
        self.auth.delete_user(radiologist_id).await?;

        tracing::info!("Deleted radiologist {}, {} scans back to unverified", radiologist_id, reset);
        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use xspand_core::{NewXRayScan, StaffPatch, XspandError};
    use xspand_integration::MemoryAuthProvider;

    struct Fixture {
        records: RecordStore,
        relationships: Arc<RelationshipManager>,
        auth: Arc<MemoryAuthProvider>,
        users: UserService,
    }

    fn fixture() -> Fixture {
        let records = RecordStore::in_memory();
        let relationships = Arc::new(RelationshipManager::new(records.clone()));
        let auth = Arc::new(MemoryAuthProvider::new());
        let users = UserService::new(records.clone(), relationships.clone(), auth.clone());
        Fixture {
            records,
            relationships,
            auth,
            users,
        }
    }

    fn registration(email: &str) -> StaffRegistration {
        StaffRegistration {
            email: email.to_string(),
            password: "secret1".to_string(),
            full_name: "Gregory House".to_string(),
            specialization: "Diagnostics".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_doctor_uses_issued_identity() {
        let f = fixture();
        let doctor = f.users.register_doctor(&registration("house@example.com")).await.unwrap();

        assert_eq!(doctor.role, UserRole::Doctor);
        assert!(f.auth.contains(&doctor.user_id).await);
        assert_eq!(f.users.get_doctor(&doctor.user_id).await.unwrap(), doctor);
    }

    #[tokio::test]
    async fn test_invalid_registration_creates_no_identity() {
        let f = fixture();
        let mut bad = registration("house@example.com");
        bad.password = "123".to_string();

        let result = f.users.register_doctor(&bad).await;
        assert!(matches!(result, Err(XspandError::Validation(_))));
        assert_eq!(f.auth.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_doctor() {
        let f = fixture();
        let doctor = f.users.register_doctor(&registration("house@example.com")).await.unwrap();

        let patch = StaffPatch {
            specialization: Some("Nephrology".to_string()),
            ..Default::default()
        };
        let updated = f.users.update_doctor(&doctor.user_id, &patch).await.unwrap();
        assert_eq!(updated.specialization, "Nephrology");
        assert_eq!(updated.full_name, doctor.full_name);

        let missing = f.users.update_doctor("nobody", &patch).await;
        assert!(matches!(missing, Err(XspandError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_doctor_cascades_and_revokes_identity() {
        let f = fixture();
        let doctor = f.users.register_doctor(&registration("house@example.com")).await.unwrap();
        f.relationships.register(&doctor.user_id, "p1").await.unwrap();
        f.relationships.register(&doctor.user_id, "p2").await.unwrap();
        f.relationships.register("other", "p1").await.unwrap();

        let removed = f.users.delete_doctor(&doctor.user_id).await.unwrap();

        assert_eq!(removed, 2);
        assert!(f.relationships.relations_for_doctor(&doctor.user_id).await.unwrap().is_empty());
        assert_eq!(f.relationships.relations().await.unwrap().len(), 1);
        assert!(!f.auth.contains(&doctor.user_id).await);
        assert!(f.users.get_doctor(&doctor.user_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_doctor_is_not_found() {
        let f = fixture();
        let result = f.users.delete_doctor("nobody").await;
        assert!(matches!(result, Err(XspandError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_radiologist_unverifies_scans() {
        let f = fixture();
        let radiologist = f
            .users
            .register_radiologist(&registration("cuddy@example.com"))
            .await
            .unwrap();

        let scan = NewXRayScan {
            image_url: "https://images.example.com/1.png".to_string(),
            patient_id: "p1".to_string(),
            doctor_id: "d1".to_string(),
            radiologist_id: Some(radiologist.user_id.clone()),
            radiologist_report: Some("clear".to_string()),
            ai_classification: None,
            no_findings_detected: Some(true),
            scan_timestamp: None,
        }
        .into_scan("scan-1".to_string(), Utc::now());
        f.records.create(&scan).await.unwrap();

        let reset = f.users.delete_radiologist(&radiologist.user_id).await.unwrap();
        assert_eq!(reset, 1);

        let stored = f.records.get::<XRayScan>("scan-1").await.unwrap();
        assert!(stored.is_unverified());
        assert!(stored.radiologist_report.is_none());
        assert!(!f.auth.contains(&radiologist.user_id).await);
    }
}
