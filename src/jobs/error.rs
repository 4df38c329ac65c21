use std::fmt::Display;

/// Classified job failures. Validation and Overload surface to the caller at
/// submission time; everything else terminates the job as Failed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    Validation(String),
    Overload,
    Fetch(String),
    Conversion(String),
    DurationExceeded { actual: f64, limit: f64 },
    Timeout,
    Internal(String),
}

impl JobError {
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation_error",
            JobError::Overload => "overload",
            JobError::Fetch(_) => "fetch_error",
            JobError::Conversion(_) => "conversion_error",
            JobError::DurationExceeded { .. } => "duration_exceeded",
            JobError::Timeout => "processing_timeout",
            JobError::Internal(_) => "internal_error",
        }
    }
}

impl Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Validation(msg) => write!(f, "invalid request: {}", msg),
            JobError::Overload => write!(f, "service at capacity, try again later"),
            JobError::Fetch(msg) => write!(f, "failed to fetch input: {}", msg),
            JobError::Conversion(msg) => write!(f, "media conversion failed: {}", msg),
            JobError::DurationExceeded { actual, limit } => {
                write!(f, "input duration {:.1}s exceeds limit {:.1}s", actual, limit)
            }
            JobError::Timeout => write!(f, "processing deadline exceeded"),
            JobError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for JobError {}
