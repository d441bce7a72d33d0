mod handler;
mod model;

pub use handler::contact;
pub use model::{ContactIndexEntry, ContactRecord, ContactRequest, ContactResponse};
