//! One-shot CLI commands.

pub mod evaluate;

pub use evaluate::EvaluateArgs;
