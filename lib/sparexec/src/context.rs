use crate::algebra::GraphPattern;
use crate::binding::SolutionIter;
use crate::dataset::QueryableDataset;
use crate::eval;
use crate::error::QueryEvaluationError;
use crate::expression::ExpressionEvaluator;
use crate::limits::QueryExecutionLimits;
use crate::multiset::Multiset;
use oxrdf::{GraphName, GraphNameRef, NamedNode, Term};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A custom function callable from expressions, `None` being an evaluation error.
pub type CustomFunction = Arc<dyn (Fn(&[Term]) -> Option<Term>) + Send + Sync>;

pub(crate) type CustomFunctionRegistry = HashMap<NamedNode, CustomFunction>;

/// A token to cancel a running evaluation from another thread.
///
/// Cloning the token shares the cancellation state.
///
/// ```
/// use sparexec::CancellationToken;
///
/// let token = CancellationToken::new();
/// let shared = token.clone();
/// shared.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Default, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Combines a per-query timeout with a global one.
///
/// [`Duration::ZERO`] means "no limit". The most restrictive non-zero bound wins.
///
/// ```
/// use sparexec::effective_timeout;
/// use std::time::Duration;
///
/// let s = Duration::from_secs;
/// assert_eq!(effective_timeout(s(10), s(30)), s(10));
/// assert_eq!(effective_timeout(s(0), s(30)), s(30));
/// assert_eq!(effective_timeout(s(60), s(0)), s(60));
/// assert_eq!(effective_timeout(s(0), s(0)), Duration::ZERO);
/// ```
pub fn effective_timeout(query: Duration, global: Duration) -> Duration {
    match (query.is_zero(), global.is_zero()) {
        (true, _) => global,
        (false, true) => query,
        (false, false) => query.min(global),
    }
}

struct SharedContext<'a> {
    dataset: &'a dyn QueryableDataset,
    expression_evaluator: Arc<dyn ExpressionEvaluator + Send + Sync>,
    deadline: Option<(Instant, Duration)>,
    cancellation_token: CancellationToken,
    limits: QueryExecutionLimits,
    custom_functions: Arc<CustomFunctionRegistry>,
    function_cache: RefCell<FxHashMap<NamedNode, Option<CustomFunction>>>,
}

/// The state of a single query evaluation.
///
/// It is created by [`QueryEvaluator::start`](crate::QueryEvaluator::start) and shared (cheap clones) by
/// all the operators of the query. It must not be reused for another query: the deadline and the function
/// cache are specific to one evaluation.
#[derive(Clone)]
pub struct EvaluationContext<'a> {
    shared: Rc<SharedContext<'a>>,
    active_graph: GraphName,
}

impl<'a> EvaluationContext<'a> {
    pub(crate) fn new(
        dataset: &'a dyn QueryableDataset,
        expression_evaluator: Arc<dyn ExpressionEvaluator + Send + Sync>,
        timeout: Duration,
        cancellation_token: CancellationToken,
        limits: QueryExecutionLimits,
        custom_functions: Arc<CustomFunctionRegistry>,
    ) -> Self {
        let deadline = if timeout.is_zero() {
            None
        } else {
            Instant::now()
                .checked_add(timeout)
                .map(|deadline| (deadline, timeout))
        };
        Self {
            shared: Rc::new(SharedContext {
                dataset,
                expression_evaluator,
                deadline,
                cancellation_token,
                limits,
                custom_functions,
                function_cache: RefCell::default(),
            }),
            active_graph: GraphName::DefaultGraph,
        }
    }

    #[inline]
    pub fn dataset(&self) -> &'a dyn QueryableDataset {
        self.shared.dataset
    }

    #[inline]
    pub fn expression_evaluator(&self) -> &(dyn ExpressionEvaluator + Send + Sync) {
        &*self.shared.expression_evaluator
    }

    #[inline]
    pub fn limits(&self) -> &QueryExecutionLimits {
        &self.shared.limits
    }

    /// The graph patterns are currently matched against.
    #[inline]
    pub fn active_graph(&self) -> GraphNameRef<'_> {
        self.active_graph.as_ref()
    }

    /// A context sharing the same query state but matching patterns against another graph.
    #[must_use]
    pub fn with_active_graph(&self, active_graph: impl Into<GraphName>) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
            active_graph: active_graph.into(),
        }
    }

    /// The time left before the deadline, if any.
    pub fn remaining_time(&self) -> Option<Duration> {
        let (deadline, _) = self.shared.deadline?;
        Some(deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails if the query has been cancelled or has run past its deadline.
    ///
    /// Called at every suspension point: once per produced binding or path result.
    #[inline]
    pub fn check(&self) -> Result<(), QueryEvaluationError> {
        if self.shared.cancellation_token.is_cancelled() {
            return Err(QueryEvaluationError::Cancelled);
        }
        if let Some((deadline, timeout)) = self.shared.deadline {
            if Instant::now() >= deadline {
                return Err(QueryEvaluationError::Timeout(timeout));
            }
        }
        Ok(())
    }

    /// Looks up a custom function, memoising the lookup for the rest of the query.
    pub fn resolve_function(&self, name: &NamedNode) -> Option<CustomFunction> {
        if let Some(function) = self.shared.function_cache.borrow().get(name) {
            return function.clone();
        }
        let function = self.shared.custom_functions.get(name).cloned();
        self.shared
            .function_cache
            .borrow_mut()
            .insert(name.clone(), function.clone());
        function
    }

    /// Evaluates a pattern to a [`Multiset`].
    ///
    /// ```
    /// use oxrdf::{Dataset, GraphName, Literal, NamedNode, Quad, Variable};
    /// use sparexec::{GraphPattern, QueryEvaluator};
    ///
    /// let ex = NamedNode::new("http://example.com")?;
    /// let dataset = Dataset::from_iter([Quad::new(
    ///     ex.clone(),
    ///     ex.clone(),
    ///     Literal::from(1),
    ///     GraphName::DefaultGraph,
    /// )]);
    ///
    /// let context = QueryEvaluator::new().start(&dataset);
    /// let solutions = context.evaluate(&GraphPattern::path(
    ///     ex.clone(),
    ///     ex.clone(),
    ///     Variable::new("o")?,
    /// ))?;
    /// assert_eq!(solutions.len(), 1);
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn evaluate(&self, pattern: &GraphPattern) -> Result<Multiset, QueryEvaluationError> {
        eval::evaluate(self, pattern)
    }

    /// Evaluates a pattern lazily, one binding at a time.
    pub fn evaluate_iter(&self, pattern: &GraphPattern) -> SolutionIter<'a> {
        eval::evaluate_iter(self, pattern)
    }

    /// Evaluates a pattern as a [`Stream`](futures::Stream) suspending after every binding.
    #[cfg(feature = "async")]
    pub fn evaluate_stream(&self, pattern: &GraphPattern) -> crate::SolutionStream<'a> {
        crate::SolutionStream::new(self.evaluate_iter(pattern))
    }

    #[cfg(test)]
    pub(crate) fn cached_functions(&self) -> usize {
        self.shared.function_cache.borrow().len()
    }
}
