//! Client core of the admissions console.
//!
//! - `cache`: de-duplicating query cache over the admissions API
//! - `mutation`: writes that invalidate the queries they affect
//! - `draft`: the applicant wizard and its durable draft
//! - `stats`: dashboard figures derived from admission statistics

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod draft;
pub mod models;
pub mod mutation;
pub mod notify;
pub mod stats;
pub mod ui_state;
pub mod utils;
