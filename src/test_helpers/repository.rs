//! In-memory SQLite repositories for tests.

use crate::persistence::{SqliteCareRepository, error::PersistenceError};

/// A patient inserted by [`seed_patient`].
#[derive(Debug, Clone, Copy)]
pub struct SeededPatient {
    /// The patient row.
    pub patient_id: i64,
    /// A caregiver linked to the patient, with one device token.
    pub caregiver_id: i64,
}

/// Creates a migrated in-memory repository.
pub async fn memory_repository() -> Result<SqliteCareRepository, PersistenceError> {
    let repo = SqliteCareRepository::new("sqlite::memory:").await?;
    repo.run_migrations().await?;
    Ok(repo)
}

/// Inserts a patient with one caregiver (`caregiver_id`) owning the device
/// token `device_token`.
pub async fn seed_patient(
    repo: &SqliteCareRepository,
    name: &str,
    caregiver_id: i64,
    device_token: &str,
) -> Result<SeededPatient, PersistenceError> {
    let patient_id = repo.create_patient(name).await?;
    repo.add_patient_user(patient_id, caregiver_id, "caregiver").await?;
    repo.add_device_token(caregiver_id, device_token, Some("android")).await?;
    Ok(SeededPatient { patient_id, caregiver_id })
}
