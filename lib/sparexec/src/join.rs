//! Join strategies and the lazy join driver shared by `Join`, `LeftJoin` and `Minus`.

use crate::binding::{Binding, SolutionIter};
use crate::context::EvaluationContext;
use crate::error::QueryEvaluationError;
use crate::expression::Expression;
use oxrdf::Variable;
use rustc_hash::{FxHashMap, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use tracing::debug;

/// An algorithm computing the compatible binding pairs of two inputs.
///
/// All strategies return the same set of bindings for the same inputs. They only differ in cost and in
/// the assumptions that make them fast.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum JoinStrategy {
    /// Every left binding against every right binding. Meant for joins without join variables.
    CrossProduct,
    /// Every left binding against every right binding, keeping only the compatible pairs.
    NestedLoop,
    /// Hash table keyed by the join variable values.
    ///
    /// Assumes every join variable is bound in every binding of both sides. If it is not the case
    /// the join silently degrades to [`JoinStrategy::FloatingHash`].
    FixedHash,
    /// Hash table keyed by the join variable values plus a bucket of the bindings leaving some join
    /// variable unbound, that is checked against every probe.
    FloatingHash,
    /// Keeps the left bindings that have no compatible right partner sharing at least one bound variable,
    /// using the wrapped strategy to find the partners.
    NonExistence(Box<Self>),
}

impl JoinStrategy {
    /// The default choice for a join once the build side is known.
    pub fn select(join_variables: &[Variable], build: &[Binding]) -> Self {
        if join_variables.is_empty() {
            Self::CrossProduct
        } else if build.len() <= 1 {
            Self::NestedLoop
        } else if build
            .iter()
            .all(|b| join_variables.iter().all(|v| b.is_bound(v)))
        {
            Self::FixedHash
        } else {
            Self::FloatingHash
        }
    }

    /// Wraps the strategy into a non-existence check.
    #[must_use]
    pub fn non_existence(self) -> Self {
        match self {
            Self::NonExistence(_) => self,
            _ => Self::NonExistence(Box::new(self)),
        }
    }

    pub fn is_non_existence(&self) -> bool {
        matches!(self, Self::NonExistence(_))
    }

    /// The strategy used to find compatible pairs, i.e. without the non-existence wrappers.
    pub fn base(&self) -> &Self {
        match self {
            Self::NonExistence(inner) => inner.base(),
            _ => self,
        }
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossProduct => f.write_str("CrossProduct"),
            Self::NestedLoop => f.write_str("NestedLoop"),
            Self::FixedHash => f.write_str("FixedHash"),
            Self::FloatingHash => f.write_str("FloatingHash"),
            Self::NonExistence(inner) => write!(f, "NonExistence({inner})"),
        }
    }
}

/// Hash of the join variable values, `None` if one of them is unbound.
fn join_key(binding: &Binding, join_variables: &[Variable]) -> Option<u64> {
    let mut hasher = FxHasher::default();
    for variable in join_variables {
        binding.get(variable)?.hash(&mut hasher);
    }
    Some(hasher.finish())
}

/// The right side of a join, indexed according to the strategy.
pub(crate) struct BuiltSide {
    join_variables: Rc<[Variable]>,
    index: BuiltIndex,
    len: usize,
}

enum BuiltIndex {
    Scan(Vec<Binding>),
    Hashed {
        bound: FxHashMap<u64, Vec<Binding>>,
        /// Bindings leaving some join variable unbound, only filled by the floating strategy
        unbound: Vec<Binding>,
    },
}

impl BuiltSide {
    pub(crate) fn build(
        strategy: &JoinStrategy,
        join_variables: Rc<[Variable]>,
        bindings: Vec<Binding>,
    ) -> Self {
        let len = bindings.len();
        let index = match strategy.base() {
            JoinStrategy::CrossProduct | JoinStrategy::NestedLoop => BuiltIndex::Scan(bindings),
            JoinStrategy::FixedHash | JoinStrategy::FloatingHash | JoinStrategy::NonExistence(_) => {
                let mut bound = FxHashMap::<u64, Vec<Binding>>::default();
                let mut unbound = Vec::new();
                for binding in bindings {
                    if let Some(key) = join_key(&binding, &join_variables) {
                        bound.entry(key).or_default().push(binding);
                    } else {
                        unbound.push(binding);
                    }
                }
                if !unbound.is_empty() && *strategy.base() == JoinStrategy::FixedHash {
                    debug!(
                        unbound = unbound.len(),
                        "fixed hash join with partially bound join variables, falling back to floating hash join"
                    );
                }
                BuiltIndex::Hashed { bound, unbound }
            }
        };
        Self {
            join_variables,
            index,
            len,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Calls `f` on every built binding compatible with `probe`.
    fn for_each_compatible(&self, probe: &Binding, mut f: impl FnMut(&Binding)) {
        let mut check = |candidate: &Binding| {
            if probe.is_compatible_with(candidate, &self.join_variables) {
                f(candidate);
            }
        };
        match &self.index {
            BuiltIndex::Scan(bindings) => bindings.iter().for_each(check),
            BuiltIndex::Hashed { bound, unbound } => {
                if let Some(key) = join_key(probe, &self.join_variables) {
                    if let Some(bucket) = bound.get(&key) {
                        bucket.iter().for_each(&mut check);
                    }
                } else {
                    // A partially bound probe may match any bucket
                    bound.values().flatten().for_each(&mut check);
                }
                unbound.iter().for_each(check);
            }
        }
    }

    /// The merges of `probe` with its compatible built bindings.
    pub(crate) fn join(&self, probe: &Binding, output: &mut Vec<Binding>) {
        self.for_each_compatible(probe, |candidate| output.push(probe.merge(candidate)));
    }

    /// Returns if some built binding is compatible with `probe` and shares a bound variable with it.
    pub(crate) fn eliminates(&self, probe: &Binding) -> bool {
        let mut eliminated = false;
        self.for_each_compatible(probe, |candidate| {
            eliminated |= probe.shares_bound_variable_with(candidate);
        });
        eliminated
    }

    /// Returns if some built binding is compatible with `probe`.
    pub(crate) fn has_compatible(&self, probe: &Binding) -> bool {
        let mut found = false;
        self.for_each_compatible(probe, |_| found = true);
        found
    }
}

/// A restartable source of bindings.
pub type BindingSource<'a> = Rc<dyn Fn(&EvaluationContext<'a>) -> SolutionIter<'a> + 'a>;

#[derive(Clone)]
enum JoinKind {
    Inner,
    LeftOuter {
        filter: Option<Rc<Expression>>,
        right_variables: Rc<[Variable]>,
    },
    Minus,
}

/// Lazily joins two sources of bindings.
///
/// Every call to [`iter`](Self::iter) starts a fresh traversal: the left source is streamed and the right
/// source is only evaluated and indexed when the first left binding shows up.
/// The evaluation context is checked for cancellation and timeout once per produced binding.
#[derive(Clone)]
pub struct JoinEnumerable<'a> {
    left: BindingSource<'a>,
    right: BindingSource<'a>,
    join_variables: Rc<[Variable]>,
    strategy: Option<JoinStrategy>,
    kind: JoinKind,
}

impl<'a> JoinEnumerable<'a> {
    /// An inner join, the strategy being picked when the right side is built.
    pub fn new(
        left: BindingSource<'a>,
        right: BindingSource<'a>,
        join_variables: impl Into<Rc<[Variable]>>,
    ) -> Self {
        Self {
            left,
            right,
            join_variables: join_variables.into(),
            strategy: None,
            kind: JoinKind::Inner,
        }
    }

    /// Forces a join strategy. A [`JoinStrategy::NonExistence`] strategy turns the join into a `MINUS`.
    #[must_use]
    pub fn with_strategy(mut self, strategy: JoinStrategy) -> Self {
        if strategy.is_non_existence() {
            self.kind = JoinKind::Minus;
        }
        self.strategy = Some(strategy);
        self
    }

    /// Turns the join into a `LeftJoin`.
    ///
    /// The `right_variables` that are not given a value by the right side are explicitly unbound
    /// in the left bindings without partner.
    #[must_use]
    pub fn left_outer(
        mut self,
        filter: Option<Expression>,
        right_variables: impl Into<Rc<[Variable]>>,
    ) -> Self {
        self.kind = JoinKind::LeftOuter {
            filter: filter.map(Rc::new),
            right_variables: right_variables.into(),
        };
        self
    }

    /// Turns the join into a `Minus`.
    #[must_use]
    pub fn minus(mut self) -> Self {
        self.kind = JoinKind::Minus;
        self.strategy = self.strategy.map(JoinStrategy::non_existence);
        self
    }

    pub fn iter(&self, context: &EvaluationContext<'a>) -> SolutionIter<'a> {
        Box::new(JoinIterator {
            context: context.clone(),
            left: (self.left)(context),
            right: Rc::clone(&self.right),
            join_variables: Rc::clone(&self.join_variables),
            strategy: self.strategy.clone(),
            kind: self.kind.clone(),
            built: None,
            buffered_results: Vec::new(),
        })
    }
}

struct JoinIterator<'a> {
    context: EvaluationContext<'a>,
    left: SolutionIter<'a>,
    right: BindingSource<'a>,
    join_variables: Rc<[Variable]>,
    strategy: Option<JoinStrategy>,
    kind: JoinKind,
    built: Option<BuiltSide>,
    buffered_results: Vec<Binding>,
}

impl JoinIterator<'_> {
    fn build(&mut self) -> Result<BuiltSide, QueryEvaluationError> {
        let right = (self.right)(&self.context).collect::<Result<Vec<_>, _>>()?;
        let strategy = self
            .strategy
            .clone()
            .unwrap_or_else(|| JoinStrategy::select(&self.join_variables, &right));
        debug!(
            %strategy,
            join_variables = ?self.join_variables,
            build = right.len(),
            "join build side ready"
        );
        Ok(BuiltSide::build(
            &strategy,
            Rc::clone(&self.join_variables),
            right,
        ))
    }

    fn probe(&mut self, left: Binding, built: &BuiltSide) {
        match &self.kind {
            JoinKind::Inner => built.join(&left, &mut self.buffered_results),
            JoinKind::Minus => {
                // MINUS of an empty pattern is a no-op
                if built.is_empty() || !built.eliminates(&left) {
                    self.buffered_results.push(left);
                }
            }
            JoinKind::LeftOuter {
                filter,
                right_variables,
            } => {
                let start = self.buffered_results.len();
                built.join(&left, &mut self.buffered_results);
                if let Some(filter) = filter {
                    let evaluator = self.context.expression_evaluator();
                    let mut i = start;
                    while i < self.buffered_results.len() {
                        if evaluator
                            .evaluate_effective_boolean_value(
                                filter,
                                &self.buffered_results[i],
                                &self.context,
                            )
                            .unwrap_or(false)
                        {
                            i += 1;
                        } else {
                            self.buffered_results.swap_remove(i);
                        }
                    }
                }
                if self.buffered_results.len() == start {
                    let mut left = left;
                    for variable in right_variables.iter() {
                        if !left.contains(variable) {
                            left = left.with_unbound(variable.clone());
                        }
                    }
                    self.buffered_results.push(left);
                }
            }
        }
    }
}

impl Iterator for JoinIterator<'_> {
    type Item = Result<Binding, QueryEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(result) = self.buffered_results.pop() {
                if let Err(error) = self.context.check() {
                    self.buffered_results.clear();
                    return Some(Err(error));
                }
                return Some(Ok(result));
            }
            let left = match self.left.next()? {
                Ok(left) => left,
                Err(error) => return Some(Err(error)),
            };
            let built = match self.built.take() {
                Some(built) => built,
                None => match self.build() {
                    Ok(built) => built,
                    Err(error) => {
                        // The left side is not worth reading anymore
                        self.left = Box::new(std::iter::empty());
                        return Some(Err(error));
                    }
                },
            };
            self.probe(left, &built);
            self.built = Some(built);
        }
    }
}

/// Left bindings filtered by the existence of a compatible right binding (`FILTER [NOT] EXISTS`).
pub(crate) fn exists_filter(
    left: &[Binding],
    right: Vec<Binding>,
    join_variables: Rc<[Variable]>,
    must_exist: bool,
) -> Vec<Binding> {
    let strategy = JoinStrategy::select(&join_variables, &right);
    let built = BuiltSide::build(&strategy, join_variables, right);
    left.iter()
        .filter(|l| built.has_compatible(l) == must_exist)
        .cloned()
        .collect()
}
