//! Session management

mod store;

pub use store::{LoginOutcome, Session, SessionStore};
