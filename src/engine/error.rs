use crate::model::ReservationId;
use crate::sync::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    Required,
    Malformed,
    StartNotBeforeEnd,
    TooLong(usize),
    StayTooLong(i64),
}

/// Bad form input. Names the offending field (remote column name) and rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub rule: ValidationRule,
}

impl ValidationError {
    pub fn new(field: &'static str, rule: ValidationRule) -> Self {
        Self { field, rule }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = self.field;
        match self.rule {
            ValidationRule::Required => write!(f, "{field} is required"),
            ValidationRule::Malformed => write!(f, "{field} must be a YYYY-MM-DD date"),
            ValidationRule::StartNotBeforeEnd => write!(f, "startDate must be before endDate"),
            ValidationRule::TooLong(max) => write!(f, "{field} exceeds {max} characters"),
            ValidationRule::StayTooLong(max) => write!(f, "stay exceeds {max} nights"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    NotFound(ReservationId),
    Sync(SyncError),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "invalid reservation: {e}"),
            EngineError::NotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::Sync(e) => write!(f, "sync error: {e}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Validation(e) => Some(e),
            EngineError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<SyncError> for EngineError {
    fn from(e: SyncError) -> Self {
        EngineError::Sync(e)
    }
}
