//! Shared primitive types used across the engine.

/// A stable, unique identifier for a customer.
pub type CustomerId = String;

/// A class-1 (churn) probability in [0, 1].
pub type Probability = f64;

/// Identifier of a persisted prediction.
pub type PredictionId = String;
