use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::contact::ContactNormalizer;
use crate::error::AppError;
use crate::expenses::{ExpenseLedger, NewExpense};
use crate::notifier::Notifiers;
use crate::payments::PaymentLinks;
use crate::schemas::User;
use crate::settings::Settings;
use crate::store::Store;
use crate::token::TokenIssuer;
use crate::verification::VerificationService;

pub struct AppState {
    pub tokens: Arc<TokenIssuer>,
    pub verification: VerificationService,
    pub expenses: ExpenseLedger,
    pub payment_links: PaymentLinks,
}

impl AppState {
    pub fn new(settings: &Settings, store: Arc<Store>, notifiers: Notifiers) -> Self {
        let tokens = Arc::new(TokenIssuer::new(
            &settings.auth.token_secret,
            settings.token_ttl(),
        ));
        Self {
            verification: VerificationService::new(
                store.clone(),
                notifiers,
                tokens.clone(),
                ContactNormalizer::new(settings.contact.default_country_code.as_str()),
                settings.code_ttl(),
            ),
            expenses: ExpenseLedger::new(store.clone(), settings.link_ttl()),
            payment_links: PaymentLinks::new(store),
            tokens,
        }
    }
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "name": user.name,
        "phone": user.phone,
        "email": user.email,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestCodeJson {
    #[serde(default)]
    contact: String,
    name: Option<String>,
    #[serde(default)]
    is_signup: bool,
}

#[post("/api/auth/request-code")]
async fn request_code(
    state: web::Data<AppState>,
    json: web::Json<RequestCodeJson>,
) -> Result<HttpResponse, AppError> {
    let json = json.into_inner();
    if json.contact.trim().is_empty() {
        return Err(AppError::Validation("contact is required".into()));
    }
    let requested = state
        .verification
        .request_code(&json.contact, json.name.as_deref(), json.is_signup)
        .await?;
    let mut body = json!({
        "success": true,
        "message": format!("Verification code sent to your {}", requested.contact_type),
        "contactType": requested.contact_type,
    });
    if let Some(code) = requested.dev_code {
        body["devMode"] = json!(true);
        body["code"] = json!(code);
    }
    Ok(HttpResponse::Ok().json(body))
}

#[derive(Deserialize)]
struct VerifyCodeJson {
    #[serde(default)]
    contact: String,
    #[serde(default)]
    code: String,
}

#[post("/api/auth/verify-code")]
async fn verify_code(
    state: web::Data<AppState>,
    json: web::Json<VerifyCodeJson>,
) -> Result<HttpResponse, AppError> {
    if json.contact.trim().is_empty() {
        return Err(AppError::Validation("contact is required".into()));
    }
    let verified = state
        .verification
        .verify_code(&json.contact, &json.code)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "token": verified.token,
        "user": user_json(&verified.user),
    })))
}

#[get("/api/auth/me")]
async fn me(
    state: web::Data<AppState>,
    identity: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let user = state.verification.current_user(&identity.user_id).await?;
    Ok(HttpResponse::Ok().json(user_json(&user)))
}

#[post("/api/expenses")]
async fn create_expense(
    state: web::Data<AppState>,
    identity: AuthenticatedUser,
    json: web::Json<NewExpense>,
) -> Result<HttpResponse, AppError> {
    tracing::debug!(user_id = %identity.user_id, user = %identity.name, "creating expense");
    let expense = state
        .expenses
        .create_expense(&identity.user_id, json.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "expense": expense })))
}

#[get("/api/expenses")]
async fn list_expenses(
    state: web::Data<AppState>,
    identity: AuthenticatedUser,
) -> HttpResponse {
    let expenses = state.expenses.list_expenses(&identity.user_id).await;
    HttpResponse::Ok().json(json!({ "count": expenses.len(), "expenses": expenses }))
}

#[get("/api/expenses/{id}")]
async fn get_expense(
    state: web::Data<AppState>,
    identity: AuthenticatedUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let expense = state
        .expenses
        .get_expense(&identity.user_id, &id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "expense": expense })))
}

#[get("/api/payment-links/{id}")]
async fn get_payment_link(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let details = state.payment_links.get_link_details(&id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "paymentDetails": details })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayJson {
    #[serde(default)]
    payment_method: String,
}

#[post("/api/payment-links/{id}/pay")]
async fn pay_payment_link(
    state: web::Data<AppState>,
    id: web::Path<String>,
    json: web::Json<PayJson>,
) -> Result<HttpResponse, AppError> {
    let payment = state
        .payment_links
        .redeem(&id.into_inner(), &json.payment_method)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "payment": payment })))
}

#[get("/api/stats")]
async fn stats(state: web::Data<AppState>, identity: AuthenticatedUser) -> HttpResponse {
    let summary = state.expenses.compute_stats(&identity.user_id).await;
    HttpResponse::Ok().json(json!({ "stats": summary }))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::Validation(err.to_string()).into()),
    )
    .service(health)
    .service(request_code)
    .service(verify_code)
    .service(me)
    .service(create_expense)
    .service(list_expenses)
    .service(get_expense)
    .service(get_payment_link)
    .service(pay_payment_link)
    .service(stats);
}
