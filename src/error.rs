use thiserror::Error;

/// Failures computing an energy plan. Both are data problems with the
/// profile and are never worth retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnergyError {
    #[error("profile is incomplete, missing: {}", .missing.join(", "))]
    IncompleteProfile { missing: Vec<&'static str> },

    #[error("invalid value for {field}: {value}")]
    InvalidDomainValue { field: &'static str, value: f64 },
}

/// Failures turning analyzer output into typed results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("response contained no candidate text")]
    EmptyResponse,

    #[error("no JSON {0} found in response")]
    NoJson(&'static str),

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("missing or empty field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be a finite non-negative number, got {value}")]
    InvalidNumber { field: &'static str, value: f64 },
}

/// Identity provider errors, mapped from the provider's error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no account exists for this email")]
    UserNotFound,

    #[error("incorrect email or password")]
    WrongPassword,

    #[error("an account already exists for this email")]
    EmailInUse,

    #[error("password must be at least 6 characters")]
    WeakPassword,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("too many failed attempts, try again later")]
    TooManyRequests,

    #[error("not signed in")]
    SignedOut,

    #[error("authentication failed: {0}")]
    Other(String),
}

impl AuthError {
    /// Map an Identity Toolkit `error.message` code to a typed error.
    pub fn from_code(code: &str) -> Self {
        // Some codes carry a detail suffix, e.g. "WEAK_PASSWORD : Password should be ..."
        let code = code.split(':').next().unwrap_or(code).trim();
        match code {
            "EMAIL_NOT_FOUND" => AuthError::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthError::WrongPassword,
            "EMAIL_EXISTS" => AuthError::EmailInUse,
            "WEAK_PASSWORD" => AuthError::WeakPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyRequests,
            other => AuthError::Other(other.to_string()),
        }
    }
}
