use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::AppState;

/// 客户端 IP，取不到时为 `"unknown"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // 从连接信息获取原始IP
        let remote_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        Ok(ClientIp(resolve_client_ip(
            &parts.headers,
            &state.config.client_ip_header,
            remote_ip.as_deref(),
        )))
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 依次尝试配置的请求头、`x-real-ip`、`x-forwarded-for` 第一项、连接地址
pub fn resolve_client_ip(headers: &HeaderMap, preferred_header: &str, remote_ip: Option<&str>) -> String {
    header_value(headers, preferred_header)
        .or_else(|| header_value(headers, "x-real-ip"))
        .or_else(|| {
            header_value(headers, "x-forwarded-for")
                .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        })
        .or(remote_ip) // 降级使用连接IP
        .unwrap_or("unknown")
        .to_string()
}
