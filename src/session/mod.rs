//! Session enumeration and read access.

pub mod identifier;
pub mod repository;

pub use identifier::SessionId;
pub use repository::{ReplayCommand, Session, SymbolEntry};
