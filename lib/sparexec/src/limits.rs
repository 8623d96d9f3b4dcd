use std::time::Duration;

/// Resource limits for query algebra evaluation
///
/// # Example
///
/// ```
/// use sparexec::QueryExecutionLimits;
/// use std::time::Duration;
///
/// // Create strict limits for public endpoints
/// let limits = QueryExecutionLimits::strict();
///
/// // Or create custom limits
/// let custom = QueryExecutionLimits {
///     timeout: Some(Duration::from_secs(10)),
///     max_groups: Some(5_000),
///     ..QueryExecutionLimits::default()
/// };
/// assert_eq!(limits.max_groups, Some(100));
/// assert_eq!(custom.max_property_path_depth, Some(1_000));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryExecutionLimits {
    /// Global evaluation timeout
    ///
    /// Combined with the per-query timeout given to [`QueryEvaluator::start_with_timeout`](crate::QueryEvaluator::start_with_timeout):
    /// the smaller non-zero value of the two applies.
    /// Default: 30 seconds
    pub timeout: Option<Duration>,

    /// Maximum number of groups in a grouping
    ///
    /// Default: 1,000 groups
    pub max_groups: Option<usize>,

    /// Maximum repetition depth for property paths
    ///
    /// Caps the number of steps of `{m,n}`, `+` and `*` paths. A repetition reaching a deeper step
    /// fails with [`QueryEvaluationError::PropertyPathTooLong`](crate::QueryEvaluationError::PropertyPathTooLong).
    /// For `+` and `*` the step of a node is its shortest distance from the start.
    /// Default: 1,000 levels
    pub max_property_path_depth: Option<usize>,
}

impl Default for QueryExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_groups: Some(1_000),
            max_property_path_depth: Some(1_000),
        }
    }
}

impl QueryExecutionLimits {
    /// Creates a new instance with default limits
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates strict limits suitable for public endpoints
    ///
    /// - Timeout: 5 seconds
    /// - Max groups: 100
    /// - Max property path depth: 100
    #[must_use]
    pub fn strict() -> Self {
        Self {
            timeout: Some(Duration::from_secs(5)),
            max_groups: Some(100),
            max_property_path_depth: Some(100),
        }
    }

    /// Creates permissive limits suitable for trusted internal queries
    ///
    /// - Timeout: 5 minutes
    /// - Max groups: 10,000
    /// - Max property path depth: 10,000
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            timeout: Some(Duration::from_secs(300)),
            max_groups: Some(10_000),
            max_property_path_depth: Some(10_000),
        }
    }

    /// Disables all limits (no restrictions)
    ///
    /// Use with caution - only for trusted queries or local development.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            timeout: None,
            max_groups: None,
            max_property_path_depth: None,
        }
    }
}
