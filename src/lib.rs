#![warn(missing_docs)]
//! Carewatch evaluates caregiver-defined health alerts against wearable and
//! medication data and notifies caregivers when an alert becomes active.

pub mod clock;
pub mod cmd;
pub mod config;
pub mod context;
pub mod engine;
pub mod http_client;
pub mod http_server;
pub mod live;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod supervisor;
pub mod test_helpers;
pub mod wearable;
