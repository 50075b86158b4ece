use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChurnError {
    /// Malformed or out-of-vocabulary customer input. Client fault.
    #[error("Invalid value for '{field}': {value:?} ({reason})")]
    Feature {
        field:  String,
        value:  String,
        reason: String,
    },

    /// Bundle missing, corrupt or inconsistent. Fatal at startup.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Insufficient data for '{subject}': {actual} samples, need at least {required}")]
    InsufficientData {
        subject:  String,
        required: usize,
        actual:   usize,
    },

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChurnError {
    pub fn feature(field: &str, value: impl Into<String>, reason: &str) -> Self {
        Self::Feature {
            field:  field.to_string(),
            value:  value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn insufficient(subject: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            subject: subject.into(),
            required,
            actual,
        }
    }

    /// Stable code surfaced to callers so failures stay distinguishable
    /// after crossing a wire boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Feature { .. }          => "feature_error",
            Self::ModelLoad(_)            => "model_load_error",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Prediction(_)           => "prediction_error",
            Self::Database(_)             => "database_error",
            Self::Serialization(_)        => "serialization_error",
            Self::Csv(_)                  => "csv_error",
            Self::Io(_)                   => "io_error",
            Self::Other(_)                => "internal_error",
        }
    }

    /// True for faults caused by the caller's input rather than the engine.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Feature { .. })
    }
}

pub type ChurnResult<T> = Result<T, ChurnError>;
