use oxrdf::{NamedNode, Variable};
use std::convert::Infallible;
use std::error::Error;
use std::time::Duration;

/// A SPARQL evaluation error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryEvaluationError {
    /// Error from the underlying RDF dataset
    #[error(transparent)]
    Dataset(Box<dyn Error + Send + Sync>),
    /// The evaluation has run longer than the effective timeout
    #[error("The SPARQL query has exceeded its execution timeout of {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The evaluation has been cancelled through its [`CancellationToken`](crate::CancellationToken)
    #[error("The SPARQL operation has been cancelled")]
    Cancelled,
    /// A property path repetition would need to go deeper than the configured limit
    #[error("The property path evaluation exceeded the maximal depth of {limit}")]
    PropertyPathTooLong { limit: usize },
    /// A grouping created more groups than the configured limit
    #[error("The SPARQL query created more than {limit} groups")]
    TooManyGroups { limit: usize },
    /// Error if the dataset returns the default graph even if a named graph is expected
    #[error("The SPARQL dataset returned the default graph even if a named graph is expected")]
    UnexpectedDefaultGraph,
}

impl From<Infallible> for QueryEvaluationError {
    #[inline]
    fn from(error: Infallible) -> Self {
        match error {}
    }
}

/// An error raised while evaluating an expression against a single binding.
///
/// These errors never abort a query: the operator evaluating the expression decides what they mean
/// (a filter rejects the binding, `COUNT` skips it, `SUM` becomes unbound...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ExpressionError {
    #[error("The variable {0} is not bound")]
    UnboundVariable(Variable),
    #[error("The function {0} is not supported")]
    UnknownFunction(NamedNode),
    #[error("The function {name} failed: {message}")]
    FunctionFailed { name: NamedNode, message: String },
    #[error("Type error: {0}")]
    TypeError(String),
}

impl ExpressionError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }
}
