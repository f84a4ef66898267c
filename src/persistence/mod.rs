//! Storage for alerts, patients, readings and notification routing data.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteCareRepository;
pub use traits::{AlertFilter, CareRepository};
