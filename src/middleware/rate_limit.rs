use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::ClientIp;
use crate::{AppState, cache::Metadata, error::AppError};

/// 按客户端 IP 对所有路由应用递增封禁策略
pub async fn rate_limit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.global_rate_limit {
        return next.run(req).await;
    }

    let limiter = state.limiter(state.rate_limit_store.clone());
    let policy = &limiter.policies().escalating;

    match limiter.enforce_escalating(&ip, policy, Metadata::new()).await {
        Ok(()) => next.run(req).await,
        Err(e) => {
            if e.is_throttled() {
                tracing::warn!(%ip, "request rejected by global rate limit");
            }
            AppError::from(e).into_response()
        }
    }
}
