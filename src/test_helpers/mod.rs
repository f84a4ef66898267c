//! A set of helpers for testing

mod alert;
mod repository;

pub use alert::AlertBuilder;
pub use repository::{SeededPatient, memory_repository, seed_patient};
