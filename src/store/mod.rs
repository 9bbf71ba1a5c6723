//! Session store implementations

mod document;
mod traits;

pub use document::DocumentStore;
pub use traits::SessionStore;
