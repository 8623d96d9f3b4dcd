use crate::binding::{Binding, SolutionIter};
use crate::context::EvaluationContext;
use crate::error::QueryEvaluationError;
use crate::expression::Expression;
use crate::join::{BindingSource, JoinEnumerable, JoinStrategy, exists_filter};
use oxrdf::Variable;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A bag of bindings with the set of variables that may occur in them.
///
/// [`Multiset::Identity`] (a single empty binding) is the neutral element of joins and [`Multiset::Null`]
/// (no binding) their absorbing element. An empty bag is always represented by [`Multiset::Null`].
///
/// Multisets are never mutated once built: operators return new multisets.
#[derive(Clone, Default)]
pub enum Multiset {
    /// A single empty binding
    Identity,
    /// No binding
    #[default]
    Null,
    Bindings {
        variables: BTreeSet<Variable>,
        bindings: Arc<[Binding]>,
    },
}

impl Multiset {
    /// Builds a multiset from bindings, computing its variable set from them.
    pub fn new(bindings: impl IntoIterator<Item = Binding>) -> Self {
        Self::with_variables(BTreeSet::new(), bindings)
    }

    /// Builds a multiset from bindings and a set of variables that may not all occur in the bindings.
    pub fn with_variables(
        variables: impl IntoIterator<Item = Variable>,
        bindings: impl IntoIterator<Item = Binding>,
    ) -> Self {
        let bindings = bindings.into_iter().collect::<Arc<[_]>>();
        if bindings.is_empty() {
            return Self::Null;
        }
        let mut variables = variables.into_iter().collect::<BTreeSet<_>>();
        for binding in bindings.iter() {
            variables.extend(binding.variables().cloned());
        }
        Self::Bindings {
            variables,
            bindings,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Identity => 1,
            Self::Null => 0,
            Self::Bindings { bindings, .. } => bindings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        match self {
            Self::Identity | Self::Null => None,
            Self::Bindings { variables, .. } => Some(variables.iter()),
        }
        .into_iter()
        .flatten()
    }

    /// The bindings of the bag, [`Multiset::Identity`] yielding one empty binding.
    pub fn iter(&self) -> impl Iterator<Item = Binding> + '_ {
        let (bindings, identity): (&[Binding], bool) = match self {
            Self::Identity => (&[][..], true),
            Self::Null => (&[][..], false),
            Self::Bindings { bindings, .. } => (bindings, false),
        };
        bindings
            .iter()
            .cloned()
            .chain(identity.then(Binding::default))
    }

    /// The variables of both multisets.
    pub fn join_variables(&self, other: &Self) -> Vec<Variable> {
        match (self, other) {
            (
                Self::Bindings { variables: a, .. },
                Self::Bindings { variables: b, .. },
            ) => a.intersection(b).cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn source<'a>(&self) -> BindingSource<'a> {
        let bindings = self.to_bindings();
        Rc::new(move |_: &EvaluationContext<'a>| -> SolutionIter<'a> {
            let bindings = Arc::clone(&bindings);
            Box::new((0..bindings.len()).map(move |i| Ok(bindings[i].clone())))
        })
    }

    fn to_bindings(&self) -> Arc<[Binding]> {
        match self {
            Self::Identity => vec![Binding::default()].into(),
            Self::Null => Vec::new().into(),
            Self::Bindings { bindings, .. } => Arc::clone(bindings),
        }
    }

    fn all_variables(&self, other: &Self) -> BTreeSet<Variable> {
        self.variables().chain(other.variables()).cloned().collect()
    }

    /// `Join(self, other)` with a strategy picked from the data.
    pub fn join(
        &self,
        other: &Self,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        self.join_with(other, None, context)
    }

    /// `Join(self, other)`, optionally forcing the strategy.
    ///
    /// Hash strategies build their table on the smaller side.
    pub fn join_with(
        &self,
        other: &Self,
        strategy: Option<JoinStrategy>,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => return Ok(Self::Null),
            (Self::Identity, _) => return Ok(other.clone()),
            (_, Self::Identity) => return Ok(self.clone()),
            _ => (),
        }
        let (probe, build) = if other.len() <= self.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut join = JoinEnumerable::new(probe.source(), build.source(), self.join_variables(other));
        if let Some(strategy) = strategy {
            join = join.with_strategy(strategy);
        }
        Ok(Self::with_variables(
            self.all_variables(other),
            join.iter(context).collect::<Result<Vec<_>, _>>()?,
        ))
    }

    /// `LeftJoin(self, other, filter)`.
    ///
    /// Variables of `other` that get no value in a left binding without partner are explicitly unbound.
    pub fn left_join(
        &self,
        other: &Self,
        filter: Option<&Expression>,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        self.left_join_with(other, filter, None, context)
    }

    pub fn left_join_with(
        &self,
        other: &Self,
        filter: Option<&Expression>,
        strategy: Option<JoinStrategy>,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        let right_variables = other.variables().cloned().collect::<Vec<_>>();
        self.left_join_unbinding(other, &right_variables, filter, strategy, context)
    }

    /// `LeftJoin(self, other, filter)` explicitly unbinding `right_variables` in the left bindings without partner.
    ///
    /// [`Multiset::Null`] carries no variable, so the variables of an empty right side have to be given here.
    pub(crate) fn left_join_unbinding(
        &self,
        other: &Self,
        right_variables: &[Variable],
        filter: Option<&Expression>,
        strategy: Option<JoinStrategy>,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        if self.is_empty() {
            return Ok(Self::Null);
        }
        let variables = self
            .variables()
            .chain(other.variables())
            .chain(right_variables)
            .cloned()
            .collect::<BTreeSet<_>>();
        if other.is_empty() {
            return Ok(Self::with_variables(
                variables,
                self.iter().map(|binding| {
                    right_variables.iter().fold(binding, |binding, variable| {
                        if binding.contains(variable) {
                            binding
                        } else {
                            binding.with_unbound(variable.clone())
                        }
                    })
                }),
            ));
        }
        let mut join = JoinEnumerable::new(self.source(), other.source(), self.join_variables(other))
            .left_outer(filter.cloned(), right_variables.to_vec());
        if let Some(strategy) = strategy {
            join = join.with_strategy(strategy);
        }
        Ok(Self::with_variables(
            variables,
            join.iter(context).collect::<Result<Vec<_>, _>>()?,
        ))
    }

    /// `Minus(self, other)`.
    ///
    /// If `other` is empty `self` is returned unchanged, as it is when the two multisets have no variable in common.
    pub fn minus(
        &self,
        other: &Self,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        self.minus_with(other, None, context)
    }

    pub fn minus_with(
        &self,
        other: &Self,
        strategy: Option<JoinStrategy>,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        if self.is_empty() {
            return Ok(Self::Null);
        }
        let join_variables = self.join_variables(other);
        if other.is_empty() || other.is_identity() || join_variables.is_empty() {
            return Ok(self.clone());
        }
        let mut join =
            JoinEnumerable::new(self.source(), other.source(), join_variables).minus();
        if let Some(strategy) = strategy {
            join = join.with_strategy(strategy.non_existence());
        }
        Ok(Self::with_variables(
            self.variables().cloned(),
            join.iter(context).collect::<Result<Vec<_>, _>>()?,
        ))
    }

    /// `FILTER EXISTS` (`must_exist = true`) or `FILTER NOT EXISTS` (`must_exist = false`) against `other`.
    ///
    /// Unlike [`minus`](Self::minus), a non-empty `other` without common variables is compatible with
    /// everything: `EXISTS` keeps all of `self` and `NOT EXISTS` removes all of it.
    pub fn exists_join(&self, other: &Self, must_exist: bool) -> Self {
        if self.is_empty() || other.is_identity() {
            return self.clone();
        }
        if other.is_empty() {
            return if must_exist {
                Self::Null
            } else {
                self.clone()
            };
        }
        let bindings = exists_filter(
            &self.to_bindings(),
            other.to_bindings().to_vec(),
            self.join_variables(other).into(),
            must_exist,
        );
        Self::with_variables(self.variables().cloned(), bindings)
    }

    /// The concatenation of both bags.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Self::with_variables(
            self.all_variables(other),
            self.to_bindings()
                .iter()
                .chain(other.to_bindings().iter())
                .cloned()
                .collect::<Vec<_>>(),
        )
    }

    /// The cartesian product of both bags, meant for bags without common variables.
    pub fn product(
        &self,
        other: &Self,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        self.join_with(other, Some(JoinStrategy::CrossProduct), context)
    }

    /// The bindings for which the expression has the effective boolean value `true`.
    ///
    /// Bindings raising an evaluation error are removed.
    pub fn filter(
        &self,
        expression: &Expression,
        context: &EvaluationContext<'_>,
    ) -> Result<Self, QueryEvaluationError> {
        let evaluator = context.expression_evaluator();
        let mut output = Vec::new();
        for binding in self.to_bindings().iter() {
            context.check()?;
            if evaluator
                .evaluate_effective_boolean_value(expression, binding, context)
                .unwrap_or(false)
            {
                output.push(binding.clone());
            }
        }
        Ok(Self::with_variables(self.variables().cloned(), output))
    }
}

impl FromIterator<Binding> for Multiset {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Debug for Multiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Identity"),
            Self::Null => f.write_str("Null"),
            Self::Bindings { bindings, .. } => f.debug_list().entries(bindings.iter()).finish(),
        }
    }
}

impl PartialEq for Multiset {
    /// Bag equality, ignoring the binding order.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut a = self.to_bindings().to_vec();
        let mut b = other.to_bindings().to_vec();
        a.sort_by_cached_key(ToString::to_string);
        b.sort_by_cached_key(ToString::to_string);
        a == b
    }
}
