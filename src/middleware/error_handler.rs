use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

// 记录日志时最多读取的响应体长度
const LOGGED_BODY_LIMIT: usize = 1024;

/// 记录被限流（429）和服务端错误（5xx）的响应，响应体原样返回
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    let status = response.status();
    let throttled = status == StatusCode::TOO_MANY_REQUESTS;
    if !throttled && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, LOGGED_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(%method, %path, %status, error = %e, "failed to read error response body");
            parts.headers.remove(CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };
    let body = String::from_utf8_lossy(&bytes);

    if throttled {
        warn!(%method, %path, %body, "request throttled");
    } else {
        error!(%method, %path, %status, %body, "server error");
    }

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
