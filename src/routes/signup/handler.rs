use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, header::USER_AGENT},
};

use super::model::{SignupRecord, SignupRequest, SignupResponse};
use crate::{
    AppState,
    cache::Metadata,
    error::AppError,
    middleware::ClientIp,
    utils::{ApiResponse, success_to_api_response},
};

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Form(req): Form<SignupRequest>,
) -> Result<Json<ApiResponse<SignupResponse>>, AppError> {
    let email = req.validate()?;

    let Some(store) = state.signup_store.clone() else {
        tracing::error!("signup store not configured");
        return Err(AppError::StoreNotConfigured("Email store not configured"));
    };

    // 按邮箱和 IP 分别限流
    let limiter = state.limiter(Some(store.clone()));
    let policies = limiter.policies();
    limiter
        .enforce_rate_limit(&email, &policies.signup_email, Metadata::new())
        .await?;
    limiter
        .enforce_rate_limit(&ip, &policies.signup_ip, Metadata::new())
        .await?;

    if SignupRecord::exists(store.as_ref(), &email).await? {
        tracing::debug!(%email, "email already subscribed");
        return Ok(success_to_api_response(
            "You are already subscribed!",
            SignupResponse {
                email,
                already_exists: true,
            },
        ));
    }

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let record = SignupRecord::new(&email, &ip, user_agent, state.clock.now());
    record.save(store.as_ref()).await?;
    tracing::info!(%email, %ip, "new signup stored");

    Ok(success_to_api_response(
        "Thank you! We'll notify you when we launch.",
        SignupResponse {
            email,
            already_exists: false,
        },
    ))
}
