use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, header::USER_AGENT},
};

use super::model::{ContactRecord, ContactRequest, ContactResponse};
use crate::{
    AppState,
    cache::Metadata,
    error::AppError,
    middleware::ClientIp,
    utils::{ApiResponse, success_to_api_response},
};

#[axum::debug_handler]
pub async fn contact(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Form(req): Form<ContactRequest>,
) -> Result<Json<ApiResponse<ContactResponse>>, AppError> {
    let req = req.validate()?;

    let Some(store) = state.contact_store.clone() else {
        tracing::error!("contact store not configured");
        return Err(AppError::StoreNotConfigured("Contact store not configured"));
    };

    let limiter = state.limiter(Some(store.clone()));
    let policies = limiter.policies();
    limiter
        .enforce_rate_limit(&req.email, &policies.contact_email, Metadata::new())
        .await?;
    limiter
        .enforce_rate_limit(&ip, &policies.contact_ip, Metadata::new())
        .await?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let record = ContactRecord::new(req, &ip, user_agent, state.clock.now());
    record.save(store.as_ref()).await?;
    tracing::info!(contact_id = %record.id, %ip, "contact submission stored");

    Ok(success_to_api_response(
        "Thank you for your message! We'll get back to you soon.",
        ContactResponse {
            contact_id: record.id,
        },
    ))
}
