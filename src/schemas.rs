use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contact::ContactType;

pub type UserId = String;

/// Random 128-bit identifier used for users, expenses and payment links.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn matches_contact(&self, contact: &str) -> bool {
        self.phone.as_deref() == Some(contact) || self.email.as_deref() == Some(contact)
    }

    pub fn snapshot(&self) -> PayerSnapshot {
        PayerSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }
}

/// A one-time code bound to a normalized contact.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCode {
    pub contact: String,
    pub contact_type: ContactType,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    /// Pending display name, only present for signups.
    pub name: Option<String>,
    pub is_signup: bool,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn redeemable_by(&self, contact: &str, code: &str, now: DateTime<Utc>) -> bool {
        !self.used && self.contact == contact && self.code == code && self.expires_at > now
    }
}

/// Copy of the paying user taken when an expense is created.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PayerSnapshot {
    pub id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Split tag stored on an expense when the request names none. The tag is
/// recorded as given; every expense is split equally.
pub const EQUAL_SPLIT: &str = "equal";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantShare {
    pub name: String,
    pub email: Option<String>,
    pub amount: f64,
    pub payment_link_id: String,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub paid_by: PayerSnapshot,
    pub split_type: String,
    pub participants: Vec<ParticipantShare>,
    /// Participants plus the payer.
    pub total_people: usize,
    pub amount_per_person: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub id: String,
    pub expense_id: String,
    pub participant_name: String,
    pub participant_email: Option<String>,
    pub amount: f64,
    pub description: String,
    pub paid_by: PayerSnapshot,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PaymentLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}
