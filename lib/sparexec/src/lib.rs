#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod aggregate;
mod algebra;
mod binding;
mod context;
mod dataset;
mod error;
mod eval;
mod expression;
mod join;
mod limits;
mod multiset;
mod numeric;
mod path;
#[cfg(feature = "async")]
mod stream;

pub use crate::aggregate::{AggregateAccumulator, AggregateExpression, AggregateFunction};
pub use crate::algebra::{GraphPattern, TermPattern};
pub use crate::binding::{Binding, SolutionIter};
use crate::context::CustomFunctionRegistry;
pub use crate::context::{CancellationToken, CustomFunction, EvaluationContext, effective_timeout};
pub use crate::dataset::{QueryableDataset, TripleIter};
pub use crate::error::{ExpressionError, QueryEvaluationError};
pub use crate::expression::{
    Expression, ExpressionEvaluator, StandardExpressionEvaluator, effective_boolean_value,
};
pub use crate::join::{BindingSource, JoinEnumerable, JoinStrategy};
pub use crate::limits::QueryExecutionLimits;
pub use crate::multiset::Multiset;
pub use crate::numeric::{NumericRank, NumericTotals, NumericValue, compare_terms};
pub use crate::path::{PathEvaluator, PathExpression, PathIter, PathResult};
#[cfg(feature = "async")]
pub use crate::stream::SolutionStream;
use oxrdf::{NamedNode, Term};
use std::sync::Arc;
use std::time::Duration;

/// Prepares the evaluation of algebra trees against a [`QueryableDataset`].
///
/// The evaluator itself is a reusable configuration: each call to [`start`](Self::start) creates a fresh
/// [`EvaluationContext`] holding the state of one query evaluation.
///
/// ```
/// use oxrdf::{Dataset, GraphName, Literal, NamedNode, Quad, Variable};
/// use sparexec::{
///     AggregateExpression, AggregateFunction, GraphPattern, QueryEvaluator, QueryExecutionLimits,
/// };
///
/// let ex = NamedNode::new("http://example.com/p")?;
/// let dataset = Dataset::from_iter([1, 2].map(|i| {
///     Quad::new(
///         NamedNode::new(format!("http://example.com/{i}")).unwrap(),
///         ex.clone(),
///         Literal::from(i),
///         GraphName::DefaultGraph,
///     )
/// }));
/// let (s, o, sum) = (Variable::new("s")?, Variable::new("o")?, Variable::new("sum")?);
/// let pattern = GraphPattern::Group {
///     inner: Box::new(GraphPattern::path(s, ex, o.clone())),
///     variables: Vec::new(),
///     aggregates: vec![(sum.clone(), AggregateExpression::new(AggregateFunction::Sum, o))],
/// };
///
/// let context = QueryEvaluator::new()
///     .with_limits(QueryExecutionLimits::strict())
///     .start(&dataset);
/// let solutions = context.evaluate(&pattern)?;
/// assert_eq!(
///     solutions.iter().next().and_then(|b| b.get(&sum).cloned()),
///     Some(Literal::from(3).into())
/// );
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Default)]
pub struct QueryEvaluator {
    limits: QueryExecutionLimits,
    cancellation_token: Option<CancellationToken>,
    custom_functions: CustomFunctionRegistry,
    expression_evaluator: Option<Arc<dyn ExpressionEvaluator + Send + Sync>>,
}

impl QueryEvaluator {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resource limits, [`QueryExecutionLimits::default`] if not set.
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: QueryExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Allows to cancel the evaluations started by this evaluator.
    ///
    /// ```
    /// use oxrdf::{Dataset, GraphName, NamedNode, Quad, Variable};
    /// use sparexec::{CancellationToken, GraphPattern, QueryEvaluationError, QueryEvaluator};
    ///
    /// let ex = NamedNode::new("http://example.com")?;
    /// let dataset = Dataset::from_iter([Quad::new(
    ///     ex.clone(),
    ///     ex.clone(),
    ///     ex.clone(),
    ///     GraphName::DefaultGraph,
    /// )]);
    /// let cancellation_token = CancellationToken::new();
    /// let context = QueryEvaluator::new()
    ///     .with_cancellation_token(cancellation_token.clone())
    ///     .start(&dataset);
    /// let mut solutions =
    ///     context.evaluate_iter(&GraphPattern::path(Variable::new("s")?, ex, Variable::new("o")?));
    /// cancellation_token.cancel(); // We cancel
    /// assert!(matches!(
    ///     solutions.next(),
    ///     Some(Err(QueryEvaluationError::Cancelled))
    /// ));
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    #[inline]
    #[must_use]
    pub fn with_cancellation_token(mut self, cancellation_token: CancellationToken) -> Self {
        self.cancellation_token = Some(cancellation_token);
        self
    }

    /// Adds a custom function callable with [`Expression::FunctionCall`].
    ///
    /// Returning `None` is an evaluation error.
    #[inline]
    #[must_use]
    pub fn with_custom_function(
        mut self,
        name: NamedNode,
        evaluator: impl Fn(&[Term]) -> Option<Term> + Send + Sync + 'static,
    ) -> Self {
        self.custom_functions.insert(name, Arc::new(evaluator));
        self
    }

    /// Replaces the [`StandardExpressionEvaluator`].
    #[inline]
    #[must_use]
    pub fn with_expression_evaluator(
        mut self,
        evaluator: impl ExpressionEvaluator + Send + Sync + 'static,
    ) -> Self {
        self.expression_evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Starts a query evaluation bounded by the global timeout of the limits.
    pub fn start<'a>(&self, dataset: &'a dyn QueryableDataset) -> EvaluationContext<'a> {
        self.start_with_timeout(dataset, Duration::ZERO)
    }

    /// Starts a query evaluation with its own timeout.
    ///
    /// The deadline is computed once, here, from the most restrictive of `timeout` and of the
    /// global timeout of the limits. [`Duration::ZERO`] means no limit.
    pub fn start_with_timeout<'a>(
        &self,
        dataset: &'a dyn QueryableDataset,
        timeout: Duration,
    ) -> EvaluationContext<'a> {
        EvaluationContext::new(
            dataset,
            self.expression_evaluator
                .clone()
                .unwrap_or_else(|| Arc::new(StandardExpressionEvaluator)),
            effective_timeout(timeout, self.limits.timeout.unwrap_or(Duration::ZERO)),
            self.cancellation_token.clone().unwrap_or_default(),
            self.limits.clone(),
            Arc::new(self.custom_functions.clone()),
        )
    }
}
