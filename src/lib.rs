//! Weather severity classification service.
//!
//! A deterministic tiered rule engine labels synthetic weather observations,
//! a gradient-boosted multiclass model is trained on the resulting balanced
//! corpus, and the persisted artifact serves point predictions behind a
//! small HTTP API (postal code in, severity category out).

pub mod api;
pub mod config;
pub mod corpus;
pub mod error;
pub mod geo;
pub mod ml;
pub mod models;
pub mod rules;
pub mod weather;
