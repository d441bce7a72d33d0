mod handler;
mod model;

pub use handler::signup;
pub use model::{SignupRecord, SignupRequest, SignupResponse};
