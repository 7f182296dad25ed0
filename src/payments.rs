//! Unauthenticated, single-use payment links.
//!
//! Redeeming a link is a state flip on the link and on the matching
//! participant share of its expense. No payment gateway is involved.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::schemas::{PayerSnapshot, PaymentLink};
use crate::store::Store;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub id: String,
    pub expense_id: String,
    pub amount: f64,
    pub description: String,
    pub paid_by: PayerSnapshot,
    pub participant_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&PaymentLink> for PaymentDetails {
    fn from(link: &PaymentLink) -> Self {
        Self {
            id: link.id.clone(),
            expense_id: link.expense_id.clone(),
            amount: link.amount,
            description: link.description.clone(),
            paid_by: link.paid_by.clone(),
            participant_name: link.participant_name.clone(),
            created_at: link.created_at,
            expires_at: link.expires_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub link_id: String,
    pub expense_id: String,
    pub participant_name: String,
    pub amount: f64,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
}

pub struct PaymentLinks {
    store: Arc<Store>,
}

impl PaymentLinks {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn get_link_details(&self, link_id: &str) -> Result<PaymentDetails, AppError> {
        let now = Utc::now();
        self.store
            .read(|data| {
                let link = data
                    .payment_links
                    .iter()
                    .find(|link| link.id == link_id)
                    .ok_or(AppError::NotFound("payment link"))?;
                if link.used || link.is_expired(now) {
                    return Err(AppError::Gone);
                }
                Ok(PaymentDetails::from(link))
            })
            .await
    }

    pub async fn redeem(&self, link_id: &str, payment_method: &str) -> Result<Payment, AppError> {
        let payment_method = payment_method.trim();
        if payment_method.is_empty() {
            return Err(AppError::Validation("paymentMethod is required".into()));
        }

        let now = Utc::now();
        let payment = self
            .store
            .write(|data| {
                let link = data
                    .payment_links
                    .iter_mut()
                    .find(|link| link.id == link_id)
                    .ok_or(AppError::NotFound("payment link"))?;
                if link.used {
                    return Err(AppError::AlreadyUsed);
                }
                if link.is_expired(now) {
                    return Err(AppError::Gone);
                }
                link.used = true;
                link.paid_at = Some(now);
                link.payment_method = Some(payment_method.to_string());
                let payment = Payment {
                    link_id: link.id.clone(),
                    expense_id: link.expense_id.clone(),
                    participant_name: link.participant_name.clone(),
                    amount: link.amount,
                    payment_method: payment_method.to_string(),
                    paid_at: now,
                };

                let share = data
                    .expenses
                    .iter_mut()
                    .filter(|expense| expense.id == payment.expense_id)
                    .flat_map(|expense| expense.participants.iter_mut())
                    .find(|share| share.payment_link_id == payment.link_id);
                match share {
                    Some(share) => {
                        share.paid = true;
                        share.paid_at = Some(now);
                        share.payment_method = Some(payment_method.to_string());
                    }
                    None => tracing::warn!(
                        link_id = %payment.link_id,
                        expense_id = %payment.expense_id,
                        "payment link has no matching participant share"
                    ),
                }
                Ok(payment)
            })
            .await?;

        tracing::info!(
            link_id = %payment.link_id,
            expense_id = %payment.expense_id,
            payment_method = %payment.payment_method,
            "payment link redeemed"
        );
        Ok(payment)
    }
}
