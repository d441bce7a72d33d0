mod client_ip;
mod error_handler;
mod rate_limit;

pub use client_ip::{ClientIp, resolve_client_ip};
pub use error_handler::log_errors;
pub use rate_limit::rate_limit;
