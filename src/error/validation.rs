use thiserror::Error;

/// Run settings that must be strictly positive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RunField {
    #[error("requests")]
    Requests,
    #[error("concurrency")]
    Concurrency,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing target URL (pass it as an argument or set 'target' in config).")]
    MissingTarget,
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL '{url}' is missing host.")]
    UrlMissingHost { url: String },
    #[error("Unsupported URL scheme '{scheme}'. Use http or https.")]
    UnsupportedScheme { scheme: String },
    #[error("Payload is not valid JSON: {source}")]
    InvalidJsonPayload {
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be >= 1.")]
    MustBePositive { field: RunField },
    #[error("Invalid boolean '{value}'. Expected true/false, yes/no, on/off, or 1/0.")]
    InvalidBoolean { value: String },
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
