//! In-memory dataset with whole-document snapshots.
//!
//! The four collections are the single source of truth. Every mutation runs
//! under one lock and ends with a full snapshot write through a [`Snapshot`]
//! backend, so operations never interleave.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, StoreError};
use crate::schemas::{Expense, PaymentLink, User, VerificationCode};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub payment_links: Vec<PaymentLink>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub verification_codes: Vec<VerificationCode>,
}

impl Dataset {
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn user_by_contact(&self, contact: &str) -> Option<&User> {
        self.users.iter().find(|user| user.matches_contact(contact))
    }
}

/// Durable backing for the dataset.
pub trait Snapshot: Send + Sync {
    fn load(&self) -> Result<Dataset, StoreError>;
    fn save(&self, data: &Dataset) -> Result<(), StoreError>;
}

/// Pretty-printed JSON document overwritten on every save.
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Snapshot for JsonFileSnapshot {
    fn load(&self) -> Result<Dataset, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no snapshot found, starting empty");
                Ok(Dataset::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, data: &Dataset) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

/// Keeps the last saved snapshot in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySnapshot {
    saved: Mutex<Option<Dataset>>,
}

#[cfg(test)]
impl MemorySnapshot {
    pub fn last_saved(&self) -> Option<Dataset> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl Snapshot for MemorySnapshot {
    fn load(&self) -> Result<Dataset, StoreError> {
        Ok(self.last_saved().unwrap_or_default())
    }

    fn save(&self, data: &Dataset) -> Result<(), StoreError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(data.clone());
        Ok(())
    }
}

pub struct Store {
    data: tokio::sync::Mutex<Dataset>,
    snapshot: Arc<dyn Snapshot>,
}

impl Store {
    pub fn open(snapshot: Arc<dyn Snapshot>) -> Result<Self, StoreError> {
        let data = snapshot.load()?;
        tracing::info!(
            users = data.users.len(),
            expenses = data.expenses.len(),
            payment_links = data.payment_links.len(),
            "dataset loaded"
        );
        Ok(Self {
            data: tokio::sync::Mutex::new(data),
            snapshot,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            data: tokio::sync::Mutex::new(Dataset::default()),
            snapshot: Arc::new(MemorySnapshot::default()),
        }
    }

    pub async fn read<T>(&self, f: impl FnOnce(&Dataset) -> T) -> T {
        let data = self.data.lock().await;
        f(&data)
    }

    /// Runs `f` under the lock and snapshots the dataset if it succeeds.
    /// A failed save leaves the in-memory mutation in place.
    pub async fn write<T>(
        &self,
        f: impl FnOnce(&mut Dataset) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut data = self.data.lock().await;
        let output = f(&mut data)?;
        self.snapshot.save(&data)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactType;
    use crate::schemas::{ParticipantShare, PayerSnapshot};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn sample() -> Dataset {
        let now = Utc::now();
        let payer = PayerSnapshot {
            id: "u1".into(),
            name: "Ana".into(),
            phone: Some("+14155552671".into()),
            email: None,
        };
        let link = |id: &str, name: &str| PaymentLink {
            id: id.into(),
            expense_id: "e1".into(),
            participant_name: name.into(),
            participant_email: None,
            amount: 33.33,
            description: "Dinner".into(),
            paid_by: payer.clone(),
            used: false,
            created_at: now,
            paid_at: None,
            payment_method: None,
            expires_at: None,
        };
        let redeemed = PaymentLink {
            participant_email: Some("bo@example.com".into()),
            used: true,
            paid_at: Some(now),
            payment_method: Some("card".into()),
            ..link("l1", "Bo")
        };
        let expiring = PaymentLink {
            expires_at: Some(now + Duration::hours(48)),
            ..link("l2", "Cy")
        };
        let share = |link: &PaymentLink| ParticipantShare {
            name: link.participant_name.clone(),
            email: link.participant_email.clone(),
            amount: link.amount,
            payment_link_id: link.id.clone(),
            paid: link.used,
            paid_at: link.paid_at,
            payment_method: link.payment_method.clone(),
        };
        Dataset {
            expenses: vec![Expense {
                id: "e1".into(),
                description: "Dinner".into(),
                amount: 100.0,
                paid_by: payer.clone(),
                split_type: "equal".into(),
                participants: vec![share(&redeemed), share(&expiring)],
                total_people: 3,
                amount_per_person: 33.33,
                created_at: now,
            }],
            payment_links: vec![redeemed.clone(), expiring.clone()],
            users: vec![User {
                id: "u1".into(),
                name: "Ana".into(),
                phone: Some("+14155552671".into()),
                email: None,
                verified: true,
                created_at: now,
            }],
            verification_codes: vec![VerificationCode {
                contact: "+14155552671".into(),
                contact_type: ContactType::Phone,
                code: "123456".into(),
                expires_at: now,
                used: true,
                name: Some("Ana".into()),
                is_signup: true,
                created_at: now,
            }],
        }
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = JsonFileSnapshot::new(dir.path().join("data.json"));
        let data = sample();
        snapshot.save(&data).unwrap();
        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded.expenses[0].participants[0].paid_at, Some(data.payment_links[0].paid_at.unwrap()));
        assert_eq!(loaded, data);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = JsonFileSnapshot::new(dir.path().join("absent.json"));
        assert_eq!(snapshot.load().unwrap(), Dataset::default());
    }

    #[test]
    fn document_uses_expected_top_level_keys() {
        let value = serde_json::to_value(Dataset::default()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["expenses", "paymentLinks", "users", "verificationCodes"]);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            JsonFileSnapshot::new(&path).load(),
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn failed_mutation_is_not_saved() {
        let snapshot = Arc::new(MemorySnapshot::default());
        let store = Store::open(snapshot.clone()).unwrap();
        let result: Result<(), AppError> = store
            .write(|_| Err(AppError::Validation("nope".into())))
            .await;
        assert!(result.is_err());
        assert_eq!(snapshot.last_saved(), None);

        store
            .write(|data| {
                data.users.extend(sample().users);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(snapshot.last_saved().unwrap().users.len(), 1);
    }
}
