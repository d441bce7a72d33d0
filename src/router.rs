use axum::{Router, routing::post};

use crate::{
    AppState,
    middleware::{log_errors, rate_limit},
    routes,
};

// 表单相关的路由
pub fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(routes::signup::signup))
        .route("/contact", post(routes::contact::contact))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let router = Router::new().nest(&state.config.api_base_uri, form_routes());

    // 添加日志中间件和限流中间件
    router
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
