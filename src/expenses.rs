use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::schemas::{new_id, Expense, ParticipantShare, PaymentLink, EQUAL_SPLIT};
use crate::store::Store;

#[derive(Clone, Debug, Deserialize)]
pub struct NewParticipant {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    #[serde(default)]
    pub description: String,
    pub amount: Option<f64>,
    #[serde(default)]
    pub participants: Vec<NewParticipant>,
    pub split_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseStats {
    pub total_expenses: usize,
    pub total_amount: f64,
    pub paid_links: usize,
    pub pending_links: usize,
}

/// Largest accepted expense amount. Keeps cent rounding and stats totals
/// finite so every snapshot stays valid JSON.
pub const MAX_AMOUNT: f64 = 1e12;

fn round_to_2_decimals(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// Equal share of `amount` among the participants and the payer.
pub fn equal_split(amount: f64, participants: usize) -> (usize, f64) {
    let total_people = participants + 1;
    (total_people, round_to_2_decimals(amount / total_people as f64))
}

pub struct ExpenseLedger {
    store: Arc<Store>,
    link_ttl: Option<Duration>,
}

impl ExpenseLedger {
    pub fn new(store: Arc<Store>, link_ttl: Option<Duration>) -> Self {
        Self { store, link_ttl }
    }

    pub async fn create_expense(&self, payer_id: &str, new: NewExpense) -> Result<Expense, AppError> {
        let description = new.description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::Validation("description is required".into()));
        }
        let amount = match new.amount {
            Some(amount) if amount.is_finite() && amount > 0.0 && amount <= MAX_AMOUNT => amount,
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "amount must be a positive number no greater than {MAX_AMOUNT}"
                )))
            }
            None => return Err(AppError::Validation("amount is required".into())),
        };
        if new.participants.is_empty() {
            return Err(AppError::Validation("at least one participant is required".into()));
        }
        if new.participants.iter().any(|p| p.name.trim().is_empty()) {
            return Err(AppError::Validation("every participant needs a name".into()));
        }
        let split_type = new
            .split_type
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(EQUAL_SPLIT)
            .to_string();
        let (total_people, amount_per_person) = equal_split(amount, new.participants.len());

        let now = Utc::now();
        let expires_at = self.link_ttl.map(|ttl| now + ttl);
        let expense = self
            .store
            .write(|data| {
                let payer = data.user(payer_id).ok_or(AppError::UserNotFound)?.snapshot();
                let expense_id = new_id();
                let mut shares = Vec::with_capacity(new.participants.len());
                let mut links = Vec::with_capacity(new.participants.len());
                for participant in &new.participants {
                    let email = participant
                        .email
                        .as_deref()
                        .map(|email| email.trim().to_lowercase())
                        .filter(|email| !email.is_empty());
                    let link = PaymentLink {
                        id: new_id(),
                        expense_id: expense_id.clone(),
                        participant_name: participant.name.trim().to_string(),
                        participant_email: email.clone(),
                        amount: amount_per_person,
                        description: description.clone(),
                        paid_by: payer.clone(),
                        used: false,
                        created_at: now,
                        paid_at: None,
                        payment_method: None,
                        expires_at,
                    };
                    shares.push(ParticipantShare {
                        name: link.participant_name.clone(),
                        email,
                        amount: amount_per_person,
                        payment_link_id: link.id.clone(),
                        paid: false,
                        paid_at: None,
                        payment_method: None,
                    });
                    links.push(link);
                }
                let expense = Expense {
                    id: expense_id,
                    description,
                    amount,
                    paid_by: payer,
                    split_type,
                    participants: shares,
                    total_people,
                    amount_per_person,
                    created_at: now,
                };
                data.payment_links.extend(links);
                data.expenses.push(expense.clone());
                Ok(expense)
            })
            .await?;

        tracing::info!(
            expense_id = %expense.id,
            payer_id,
            amount = expense.amount,
            participants = expense.participants.len(),
            "expense created"
        );
        Ok(expense)
    }

    pub async fn list_expenses(&self, user_id: &str) -> Vec<Expense> {
        self.store
            .read(|data| {
                data.expenses
                    .iter()
                    .filter(|expense| expense.paid_by.id == user_id)
                    .cloned()
                    .collect()
            })
            .await
    }

    pub async fn get_expense(&self, user_id: &str, id: &str) -> Result<Expense, AppError> {
        self.store
            .read(|data| {
                data.expenses
                    .iter()
                    .find(|expense| expense.id == id && expense.paid_by.id == user_id)
                    .cloned()
            })
            .await
            .ok_or(AppError::NotFound("expense"))
    }

    pub async fn compute_stats(&self, user_id: &str) -> ExpenseStats {
        self.store
            .read(|data| {
                let mut stats = ExpenseStats::default();
                for expense in data.expenses.iter().filter(|e| e.paid_by.id == user_id) {
                    stats.total_expenses += 1;
                    stats.total_amount += expense.amount;
                }
                for link in data.payment_links.iter().filter(|l| l.paid_by.id == user_id) {
                    if link.used {
                        stats.paid_links += 1;
                    } else {
                        stats.pending_links += 1;
                    }
                }
                stats.total_amount = round_to_2_decimals(stats.total_amount);
                stats
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::User;
    use crate::store::JsonFileSnapshot;

    async fn ledger_with_users(ids: &[&str]) -> ExpenseLedger {
        let store = Arc::new(Store::in_memory());
        store
            .write(|data| {
                for id in ids {
                    data.users.push(User {
                        id: id.to_string(),
                        name: format!("user {id}"),
                        phone: None,
                        email: Some(format!("{id}@example.com")),
                        verified: true,
                        created_at: Utc::now(),
                    });
                }
                Ok(())
            })
            .await
            .unwrap();
        ExpenseLedger::new(store, None)
    }

    fn dinner(amount: f64, names: &[&str]) -> NewExpense {
        NewExpense {
            description: "Dinner".into(),
            amount: Some(amount),
            participants: names
                .iter()
                .map(|name| NewParticipant {
                    name: name.to_string(),
                    email: Some(format!(" {}@Example.com", name.to_lowercase())),
                })
                .collect(),
            split_type: None,
        }
    }

    #[test]
    fn split_includes_payer() {
        assert_eq!(equal_split(90.0, 2), (3, 30.0));
        assert_eq!(equal_split(100.0, 2), (3, 33.33));
        assert_eq!(equal_split(10.0, 0), (1, 10.0));
    }

    #[tokio::test]
    async fn create_expense_fans_out_payment_links() {
        let ledger = ledger_with_users(&["p"]).await;
        let expense = ledger.create_expense("p", dinner(90.0, &["A", "B"])).await.unwrap();

        assert_eq!(expense.total_people, 3);
        assert_eq!(expense.amount_per_person, 30.0);
        assert_eq!(expense.split_type, EQUAL_SPLIT);
        assert_eq!(expense.paid_by.id, "p");
        assert_eq!(expense.participants.len(), 2);
        assert_eq!(expense.participants[0].email.as_deref(), Some("a@example.com"));

        let links = ledger.store.read(|data| data.payment_links.clone()).await;
        assert_eq!(links.len(), 2);
        for (share, link) in expense.participants.iter().zip(&links) {
            assert_eq!(share.payment_link_id, link.id);
            assert_eq!(link.expense_id, expense.id);
            assert_eq!(link.amount, 30.0);
            assert_eq!(link.participant_name, share.name);
            assert!(!link.used);
            assert_eq!(link.expires_at, None);
        }
    }

    #[tokio::test]
    async fn link_ttl_sets_expiry() {
        let ledger = ledger_with_users(&["p"]).await;
        let ledger = ExpenseLedger::new(ledger.store.clone(), Some(Duration::hours(48)));
        let expense = ledger.create_expense("p", dinner(20.0, &["A"])).await.unwrap();
        let link = ledger
            .store
            .read(|data| data.payment_links[0].clone())
            .await;
        assert_eq!(link.expires_at, Some(expense.created_at + Duration::hours(48)));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let ledger = ledger_with_users(&["p"]).await;
        let cases = [
            NewExpense {
                description: "  ".into(),
                ..dinner(10.0, &["A"])
            },
            NewExpense {
                amount: None,
                ..dinner(10.0, &["A"])
            },
            dinner(-5.0, &["A"]),
            dinner(f64::NAN, &["A"]),
            dinner(1e308, &["A"]),
            dinner(MAX_AMOUNT * 2.0, &["A"]),
            dinner(10.0, &[]),
            dinner(10.0, &[" "]),
        ];
        for case in cases {
            assert!(matches!(
                ledger.create_expense("p", case).await,
                Err(AppError::Validation(_))
            ));
        }
        let expenses = ledger.store.read(|data| data.expenses.len()).await;
        assert_eq!(expenses, 0);
    }

    #[tokio::test]
    async fn unknown_split_type_is_kept_and_split_equally() {
        let ledger = ledger_with_users(&["p"]).await;
        let expense = ledger
            .create_expense(
                "p",
                NewExpense {
                    split_type: Some("percentage".into()),
                    ..dinner(60.0, &["A", "B"])
                },
            )
            .await
            .unwrap();
        assert_eq!(expense.split_type, "percentage");
        assert_eq!(expense.amount_per_person, 20.0);
    }

    #[tokio::test]
    async fn largest_amount_survives_snapshot_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = Arc::new(Store::open(Arc::new(JsonFileSnapshot::new(&path))).unwrap());
        store
            .write(|data| {
                data.users.push(User {
                    id: "p".into(),
                    name: "Pat".into(),
                    phone: None,
                    email: None,
                    verified: true,
                    created_at: Utc::now(),
                });
                Ok(())
            })
            .await
            .unwrap();
        let ledger = ExpenseLedger::new(store.clone(), None);
        let expense = ledger
            .create_expense("p", dinner(MAX_AMOUNT, &["A"]))
            .await
            .unwrap();
        assert!(expense.amount_per_person.is_finite());
        assert!(matches!(
            ledger.create_expense("p", dinner(1e308, &["A"])).await,
            Err(AppError::Validation(_))
        ));

        let before = store.read(|data| data.clone()).await;
        let reopened = Store::open(Arc::new(JsonFileSnapshot::new(&path))).unwrap();
        let after = reopened.read(|data| data.clone()).await;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn unknown_payer_is_rejected() {
        let ledger = ledger_with_users(&[]).await;
        assert!(matches!(
            ledger.create_expense("ghost", dinner(10.0, &["A"])).await,
            Err(AppError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn expenses_are_isolated_per_payer() {
        let ledger = ledger_with_users(&["p", "q"]).await;
        let first = ledger.create_expense("p", dinner(30.0, &["A"])).await.unwrap();
        let other = ledger.create_expense("q", dinner(60.0, &["B"])).await.unwrap();
        let second = ledger.create_expense("p", dinner(45.0, &["C", "D"])).await.unwrap();

        let listed: Vec<_> = ledger
            .list_expenses("p")
            .await
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, vec![first.id.clone(), second.id]);
        assert!(ledger.list_expenses("q").await.iter().all(|e| e.paid_by.id == "q"));

        assert_eq!(ledger.get_expense("p", &first.id).await.unwrap(), first);
        assert!(matches!(
            ledger.get_expense("p", &other.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            ledger.get_expense("p", "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stats_count_links_of_own_expenses() {
        let ledger = ledger_with_users(&["p", "q"]).await;
        ledger.create_expense("p", dinner(30.0, &["A"])).await.unwrap();
        ledger.create_expense("p", dinner(45.5, &["B", "C"])).await.unwrap();
        ledger.create_expense("q", dinner(99.0, &["D"])).await.unwrap();
        ledger
            .store
            .write(|data| {
                data.payment_links[0].used = true;
                Ok(())
            })
            .await
            .unwrap();

        let stats = ledger.compute_stats("p").await;
        assert_eq!(
            stats,
            ExpenseStats {
                total_expenses: 2,
                total_amount: 75.5,
                paid_links: 1,
                pending_links: 2,
            }
        );
        assert_eq!(ledger.compute_stats("nobody").await, ExpenseStats::default());
    }
}
