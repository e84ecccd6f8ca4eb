pub mod claude;
pub(crate) mod error_shapes;
pub mod flatten;
pub mod mapping;
pub mod openai_chat;
pub mod openai_responses;

pub use flatten::{IdentitySanitizer, SchemaSanitizer};
