pub mod analyzer;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod customer;
pub mod ensemble;
pub mod error;
pub mod explainer;
pub mod features;
pub mod model;
pub mod population;
pub mod prediction;
pub mod rng;
pub mod service;
pub mod stats;
pub mod store;
pub mod strategy;
pub mod synthetic;
pub mod types;
