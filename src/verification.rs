//! Passwordless signup and login through one-time verification codes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;

use crate::contact::{ContactNormalizer, ContactType};
use crate::error::AppError;
use crate::notifier::{Delivery, Notifiers};
use crate::schemas::{new_id, User, VerificationCode};
use crate::store::Store;
use crate::token::TokenIssuer;

#[derive(Debug)]
pub struct CodeRequested {
    pub contact_type: ContactType,
    /// Set when no notifier handled the code and it must be shown to the caller.
    pub dev_code: Option<String>,
}

#[derive(Debug)]
pub struct Verified {
    pub user: User,
    pub token: String,
}

pub struct VerificationService {
    store: Arc<Store>,
    notifiers: Notifiers,
    tokens: Arc<TokenIssuer>,
    normalizer: ContactNormalizer,
    code_ttl: Duration,
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

impl VerificationService {
    pub fn new(
        store: Arc<Store>,
        notifiers: Notifiers,
        tokens: Arc<TokenIssuer>,
        normalizer: ContactNormalizer,
        code_ttl: Duration,
    ) -> Self {
        Self {
            store,
            notifiers,
            tokens,
            normalizer,
            code_ttl,
        }
    }

    pub async fn request_code(
        &self,
        contact: &str,
        name: Option<&str>,
        is_signup: bool,
    ) -> Result<CodeRequested, AppError> {
        let contact = self.normalizer.normalize(contact)?;
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        if is_signup && name.is_none() {
            return Err(AppError::Validation("name is required to sign up".into()));
        }

        let code = generate_code();
        let now = Utc::now();
        let record = VerificationCode {
            contact: contact.value.clone(),
            contact_type: contact.kind,
            code: code.clone(),
            expires_at: now + self.code_ttl,
            used: false,
            name: if is_signup { name } else { None },
            is_signup,
            created_at: now,
        };
        self.store
            .write(|data| {
                let exists = data.user_by_contact(&contact.value).is_some();
                if is_signup && exists {
                    return Err(AppError::AccountExists);
                }
                if !is_signup && !exists {
                    return Err(AppError::AccountNotFound);
                }
                // Only the newest code for a contact stays redeemable.
                data.verification_codes
                    .retain(|existing| existing.contact != contact.value);
                data.verification_codes.push(record);
                Ok(())
            })
            .await?;

        let dev_code = match self.notifiers.deliver_code(&contact, &code).await? {
            Delivery::Sent => None,
            Delivery::DevMode => Some(code),
        };
        Ok(CodeRequested {
            contact_type: contact.kind,
            dev_code,
        })
    }

    pub async fn verify_code(&self, contact: &str, code: &str) -> Result<Verified, AppError> {
        let contact = self.normalizer.normalize(contact)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation("code is required".into()));
        }

        let now = Utc::now();
        let user = self
            .store
            .write(|data| {
                let index = data
                    .verification_codes
                    .iter()
                    .position(|record| record.redeemable_by(&contact.value, code, now))
                    .ok_or(AppError::CodeInvalid)?;
                let is_signup = data.verification_codes[index].is_signup;
                let pending_name = data.verification_codes[index].name.clone();

                let user = if is_signup {
                    if data.user_by_contact(&contact.value).is_some() {
                        return Err(AppError::AccountExists);
                    }
                    let (phone, email) = match contact.kind {
                        ContactType::Phone => (Some(contact.value.clone()), None),
                        ContactType::Email => (None, Some(contact.value.clone())),
                    };
                    let user = User {
                        id: new_id(),
                        name: pending_name.unwrap_or_default(),
                        phone,
                        email,
                        verified: true,
                        created_at: now,
                    };
                    data.users.push(user.clone());
                    user
                } else {
                    // Fails before the code is marked used, so the code stays redeemable.
                    let user = data
                        .users
                        .iter_mut()
                        .find(|user| user.matches_contact(&contact.value))
                        .ok_or(AppError::UserNotFound)?;
                    user.verified = true;
                    user.clone()
                };
                data.verification_codes[index].used = true;
                Ok(user)
            })
            .await?;

        let token = self.tokens.issue(&user.id, &user.name)?;
        tracing::info!(user_id = %user.id, contact_type = %contact.kind, "contact verified");
        Ok(Verified { user, token })
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User, AppError> {
        self.store
            .read(|data| data.user(user_id).cloned())
            .await
            .ok_or(AppError::UserNotFound)
    }
}
