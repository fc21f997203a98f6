//! HTTP front end for the congestion-pricing emissions model.

pub mod api;
pub mod config;
