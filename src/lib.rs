//! World Cup match outcome predictor.
//!
//! Historical results go through `dataset` and `preprocess` into encoded
//! examples, `training` fits a `forest::RandomForest` on them, and
//! `artifacts` persists the model together with its `encoder::TeamEncoder`.
//! The server loads that pair into a `service::PredictionService` and exposes
//! it through `api`.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod forest;
pub mod metrics;
pub mod preprocess;
pub mod service;
pub mod teams;
pub mod training;
