//! Error types and result definitions for the clustering core.
//!
//! Provides a classified error system with captured diagnostic metadata for
//! all clustering operations. The [`FrbrError`] type supports single errors,
//! errors with additional detail, and multiple aggregated errors.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for clustering operations using [`FrbrError`] as the error type.
pub type FrbrResult<T> = Result<T, FrbrError>;

/// Detailed payload stored for single [`FrbrError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for clustering operations.
///
/// [`FrbrError`] can represent single errors, errors with additional detail,
/// or multiple aggregated errors. The design allows rich error information
/// while keeping construction ergonomic via the [`crate::frbr_error!`] and
/// [`crate::bail!`] macros.
#[derive(Debug, Clone)]
pub struct FrbrError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    Many {
        errors: Vec<FrbrError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur while clustering records.
///
/// The taxonomy distinguishes conditions the orchestration layer must react
/// to differently: a too-large candidate pool is fatal for the run, lock
/// contention means "skip and retry later", and index failures are logged but
/// never roll back relational state.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Blocking errors
    CandidatePoolTooLarge,
    ConcurrentClustering,

    // Clustering errors
    DegenerateClustering,

    // Data & transformation errors
    ConversionError,
    InvalidData,

    // Store errors
    StoreQueryFailed,
    StoreTransactionFailed,
    MissingRecord,

    // Lock service errors
    LockServiceFailed,
    LockNotAcquired,

    // Search index errors
    IndexUpdateFailed,

    // Configuration & state errors
    ConfigError,
    InvalidState,

    // Unknown / uncategorized
    Unknown,
}

impl FrbrError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or
    /// [`ErrorKind::Unknown`] if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance.
    ///
    /// The stored source is preserved across clones and exposed via
    /// [`error::Error::source`]. Has no effect on aggregated errors because
    /// aggregates forward the first contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Creates a [`FrbrError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        let location = Location::caller();
        let backtrace = Arc::new(Backtrace::capture());

        FrbrError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location,
                backtrace,
            }),
        }
    }
}

impl PartialEq for FrbrError {
    fn eq(&self, other: &FrbrError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for FrbrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail: {detail}")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    for (n, line) in rendered.lines().enumerate() {
                        if n == 0 {
                            write!(f, "\n  {}. {}", index + 1, line)?;
                        } else {
                            write!(f, "\n     {line}")?;
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for FrbrError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            // For aggregated errors, we forward the first contained error as the source.
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`FrbrError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for FrbrError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> FrbrError {
        FrbrError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`FrbrError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for FrbrError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> FrbrError {
        FrbrError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`FrbrError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly
/// without wrapping it in an aggregate.
impl From<Vec<FrbrError>> for FrbrError {
    #[track_caller]
    fn from(mut errors: Vec<FrbrError>) -> FrbrError {
        if errors.len() == 1 {
            return errors.remove(0);
        }

        FrbrError {
            repr: ErrorRepr::Many {
                errors,
                location: Location::caller(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_error_exposes_kind_and_detail() {
        let err = FrbrError::from((
            ErrorKind::CandidatePoolTooLarge,
            "Candidate pool exceeds limit",
            "10001 > 10000",
        ));

        assert_eq!(err.kind(), ErrorKind::CandidatePoolTooLarge);
        assert_eq!(err.detail(), Some("10001 > 10000"));
        assert!(format!("{err}").contains("Candidate pool exceeds limit"));
    }

    #[test]
    fn aggregated_errors_report_first_kind() {
        let err = FrbrError::from(vec![
            FrbrError::from((ErrorKind::StoreQueryFailed, "query failed")),
            FrbrError::from((ErrorKind::IndexUpdateFailed, "index failed")),
        ]);

        assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::StoreQueryFailed, ErrorKind::IndexUpdateFailed]
        );
    }

    #[test]
    fn single_element_vector_unwraps_to_inner_error() {
        let err = FrbrError::from(vec![FrbrError::from((
            ErrorKind::ConcurrentClustering,
            "overlapping run",
        ))]);

        assert_eq!(err.kind(), ErrorKind::ConcurrentClustering);
        assert!(matches!(err.repr, ErrorRepr::Single(_)));
    }
}
