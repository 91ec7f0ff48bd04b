// src/lib.rs

//! adsync: mirrors weekly-ad images from store pages into object storage.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(feature = "lambda")]
pub mod lambda;
