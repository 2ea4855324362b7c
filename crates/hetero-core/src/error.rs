//! Error and status types for kernel dispatch and execution
//!
//! Provides a single error descriptor type shared by all hetero crates and a
//! composable [`Status`] that aggregates zero or more of them.

use std::fmt;
use thiserror::Error;

/// Core error descriptor for dispatch, validation and kernel execution
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter provided to an algorithm or kernel
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Insufficient data for the requested operation
    #[error("Insufficient data: expected at least {expected} rows, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    /// Table or buffer shape does not match what the computation requires
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    /// Result storage could not be allocated
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// A required result was never allocated or set
    #[error("Null result: {0}")]
    NullResult(String),

    /// An untyped handle could not be resolved to the expected concrete type
    #[error("Incorrect handle: expected {0}")]
    IncorrectHandle(&'static str),

    /// Device source failed to compile
    #[error("Compile error for '{cache_key}': {reason}")]
    Compile { cache_key: String, reason: String },

    /// Kernel name was not produced by a prior successful build
    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    /// An argument slot was never bound before launch
    #[error("Kernel argument {index} is not set")]
    UnsetArgument { index: usize },

    /// An argument slot holds a value of the wrong kind or access mode
    #[error("Kernel argument {index} has wrong type: expected {expected}")]
    ArgumentType { index: usize, expected: String },

    /// Kernel launch failed on the device
    #[error("Launch error: {0}")]
    Launch(String),

    /// No container is registered for the requested dispatch key
    #[error("No container registered for {0}")]
    ContainerNotRegistered(String),

    /// Target is not supported by this build or this machine
    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    /// Archive read/write failure
    #[error("Archive error: {0}")]
    Archive(String),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by callers to tell failures apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Input, parameter or result description was rejected before computing
    Validation,
    /// Computation ran (or tried to) and failed: compile, launch, allocation
    Computation,
    /// Misuse of the API: unset slots, bad handles, missing registrations
    Programming,
}

impl Error {
    /// Create an error for empty input
    pub fn empty_input(what: &str) -> Self {
        Self::InvalidInput(format!("{what} is empty"))
    }

    /// Create an error for size mismatch
    pub fn size_mismatch(what: &str, expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an error for a failed compile
    pub fn compile(cache_key: &str, reason: impl Into<String>) -> Self {
        Self::Compile {
            cache_key: cache_key.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidParameter(_)
            | Self::InvalidInput(_)
            | Self::InsufficientData { .. }
            | Self::ShapeMismatch { .. }
            | Self::NullResult(_) => ErrorClass::Validation,
            Self::Allocation(_)
            | Self::Compile { .. }
            | Self::Launch(_)
            | Self::Archive(_)
            | Self::Other(_) => ErrorClass::Computation,
            Self::IncorrectHandle(_)
            | Self::KernelNotFound(_)
            | Self::UnsetArgument { .. }
            | Self::ArgumentType { .. }
            | Self::ContainerNotRegistered(_)
            | Self::UnsupportedTarget(_) => ErrorClass::Programming,
        }
    }
}

/// Aggregate of zero or more errors
///
/// The empty aggregate means success. Statuses compose: validation code keeps
/// adding to one status and the caller inspects it once.
#[must_use]
#[derive(Debug, Default)]
pub struct Status {
    errors: Vec<Error>,
}

impl Status {
    /// The successful (empty) status
    pub fn ok() -> Self {
        Self { errors: Vec::new() }
    }

    /// Whether no error has been recorded
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record one more error
    pub fn add(&mut self, error: Error) -> &mut Self {
        self.errors.push(error);
        self
    }

    /// Append every error of `other`
    pub fn merge(&mut self, other: Status) -> &mut Self {
        self.errors.extend(other.errors);
        self
    }

    /// Recorded errors, in the order they were observed
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// First recorded error, if any
    pub fn first(&self) -> Option<&Error> {
        self.errors.first()
    }

    /// Whether any recorded error belongs to `class`
    pub fn has_class(&self, class: ErrorClass) -> bool {
        self.errors.iter().any(|e| e.class() == class)
    }

    /// Class of the first recorded error
    pub fn class(&self) -> Option<ErrorClass> {
        self.first().map(Error::class)
    }

    /// Convert into a `Result`, keeping the whole aggregate on failure
    pub fn into_result(self) -> std::result::Result<(), Status> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Consume the status, returning its errors
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl<T> From<Result<T>> for Status {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Status::ok(),
            Err(e) => e.into(),
        }
    }
}

impl FromIterator<Error> for Status {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl Extend<Error> for Status {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "ok");
        }
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Status {}

/// Return early from a `Status`-returning function when `status` is not ok
#[macro_export]
macro_rules! check_status {
    ($status:expr) => {{
        let status: $crate::Status = $status;
        if !status.is_ok() {
            return status;
        }
    }};
}

/// Return early with `$err` as a `Status` when `$cond` does not hold
#[macro_export]
macro_rules! check_or_return {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return $crate::Status::from($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidParameter("n_components must not exceed 3".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: n_components must not exceed 3");

        let err = Error::InsufficientData { expected: 2, actual: 1 };
        assert_eq!(err.to_string(), "Insufficient data: expected at least 2 rows, got 1");

        let err = Error::UnsetArgument { index: 4 };
        assert_eq!(err.to_string(), "Kernel argument 4 is not set");

        let err = Error::compile("__blas_gemm_float", "unbalanced braces");
        assert_eq!(
            err.to_string(),
            "Compile error for '__blas_gemm_float': unbalanced braces"
        );
    }

    #[test]
    fn test_error_helper_functions() {
        let err = Error::size_mismatch("eigenvectors", "2x3", "3x3");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in eigenvectors: expected 2x3, got 3x3"
        );
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = Error::empty_input("data");
        assert_eq!(err.to_string(), "Invalid input: data is empty");
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::InvalidInput(String::new()).class(), ErrorClass::Validation);
        assert_eq!(Error::Launch(String::new()).class(), ErrorClass::Computation);
        assert_eq!(Error::compile("k", "r").class(), ErrorClass::Computation);
        assert_eq!(Error::KernelNotFound("k".into()).class(), ErrorClass::Programming);
        assert_eq!(Error::UnsetArgument { index: 0 }.class(), ErrorClass::Programming);
    }

    #[test]
    fn test_status_aggregation() {
        let mut status = Status::ok();
        assert!(status.is_ok());
        assert_eq!(status.to_string(), "ok");

        status.add(Error::InvalidParameter("a".into()));
        status.merge(Status::from(Error::Launch("b".into())));
        assert!(!status.is_ok());
        assert_eq!(status.errors().len(), 2);
        assert_eq!(status.class(), Some(ErrorClass::Validation));
        assert!(status.has_class(ErrorClass::Computation));
        assert_eq!(status.to_string(), "Invalid parameter: a; Launch error: b");
    }

    #[test]
    fn test_status_from_result() {
        let ok: Result<u32> = Ok(3);
        assert!(Status::from(ok).is_ok());

        let err: Result<u32> = Err(Error::KernelNotFound("blas_axpy".into()));
        let status = Status::from(err);
        assert!(matches!(status.first(), Some(Error::KernelNotFound(_))));
        assert!(status.into_result().is_err());
    }

    #[test]
    fn test_check_status_macro() {
        fn validate(fail: bool) -> Status {
            let mut s = Status::ok();
            if fail {
                s.add(Error::InvalidInput("bad".into()));
            }
            s
        }

        fn pipeline(fail: bool, reached: &mut bool) -> Status {
            check_status!(validate(fail));
            *reached = true;
            Status::ok()
        }

        let mut reached = false;
        assert!(!pipeline(true, &mut reached).is_ok());
        assert!(!reached);
        assert!(pipeline(false, &mut reached).is_ok());
        assert!(reached);
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: Error = anyhow::anyhow!("custom error message").into();
        assert!(matches!(err, Error::Other(_)));
        assert!(err.to_string().contains("custom error message"));
    }
}
