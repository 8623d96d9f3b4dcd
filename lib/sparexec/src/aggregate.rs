//! Aggregates and the grouping operator.

use crate::binding::Binding;
use crate::context::EvaluationContext;
use crate::error::QueryEvaluationError;
use crate::expression::{Expression, effective_boolean_value};
use crate::numeric::{NumericRank, NumericTotals, NumericValue, compare_terms};
use oxrdf::{Literal, Term, Variable};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// An aggregate function applied to an expression.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum AggregateFunction {
    /// [Count](https://www.w3.org/TR/sparql11-query/#defn_aggCount) of the non-erroring values
    Count,
    /// [Sum](https://www.w3.org/TR/sparql11-query/#defn_aggSum)
    Sum,
    /// [Avg](https://www.w3.org/TR/sparql11-query/#defn_aggAvg)
    Avg,
    /// [Min](https://www.w3.org/TR/sparql11-query/#defn_aggMin)
    Min,
    /// [Max](https://www.w3.org/TR/sparql11-query/#defn_aggMax)
    Max,
    /// Minimum of the numeric values, the other values being ignored
    ///
    /// The result has the highest numeric type of the values.
    NumericMin,
    /// Maximum of the numeric values, the other values being ignored
    NumericMax,
    /// [Sample](https://www.w3.org/TR/sparql11-query/#defn_aggSample)
    Sample,
    /// [GroupConcat](https://www.w3.org/TR/sparql11-query/#defn_aggGroupConcat)
    ///
    /// The separator is evaluated against each contributing binding, a single space by default.
    GroupConcat { separator: Option<Expression> },
    /// The upper middle value once the values are sorted
    Median,
    /// The most frequent value, unbound if unbound values are at least as frequent
    Mode,
    /// `true` iff every value has the effective boolean value `true`
    All,
    /// `true` iff some value has the effective boolean value `true`
    Any,
    /// `true` iff no value has the effective boolean value `true`
    None,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::NumericMin => "NMIN",
            Self::NumericMax => "NMAX",
            Self::Sample => "SAMPLE",
            Self::GroupConcat { .. } => "GROUP_CONCAT",
            Self::Median => "MEDIAN",
            Self::Mode => "MODE",
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::None => "NONE",
        })
    }
}

/// An [aggregate expression](https://www.w3.org/TR/sparql11-query/#aggregates).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum AggregateExpression {
    /// `COUNT(*)` or `COUNT(DISTINCT *)`
    CountSolutions { distinct: bool },
    FunctionCall {
        name: AggregateFunction,
        expression: Expression,
        distinct: bool,
    },
}

impl AggregateExpression {
    pub fn new(name: AggregateFunction, expression: impl Into<Expression>) -> Self {
        Self::FunctionCall {
            name,
            expression: expression.into(),
            distinct: false,
        }
    }

    pub fn distinct(name: AggregateFunction, expression: impl Into<Expression>) -> Self {
        Self::FunctionCall {
            name,
            expression: expression.into(),
            distinct: true,
        }
    }

    /// A fresh accumulator for a new group.
    pub fn start(&self) -> AggregateAccumulator {
        AggregateAccumulator::start(self)
    }
}

impl fmt::Display for AggregateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CountSolutions { distinct: true } => f.write_str("COUNT(DISTINCT *)"),
            Self::CountSolutions { distinct: false } => f.write_str("COUNT(*)"),
            Self::FunctionCall {
                name,
                expression,
                distinct,
            } => {
                write!(f, "{name}(")?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                write!(f, "{expression}")?;
                if let AggregateFunction::GroupConcat {
                    separator: Some(separator),
                } = name
                {
                    write!(f, "; SEPARATOR = {separator}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// The state of one aggregate for one group.
///
/// Driven by [`accept`](Self::accept) once per binding of the group, then [`end`](Self::end) once,
/// after which [`value`](Self::value) is the aggregate result (`None` meaning unbound).
pub struct AggregateAccumulator {
    expression: Option<Expression>,
    seen_values: Option<FxHashSet<Term>>,
    seen_bindings: Option<FxHashSet<Binding>>,
    state: AccumulatorState,
    value: Option<Term>,
}

enum AccumulatorState {
    Count(u64),
    Sum(Option<NumericTotals>),
    Avg {
        totals: Option<NumericTotals>,
        count: u64,
    },
    /// `None` if an incomparable pair has been met
    Min(Option<Option<Term>>),
    Max(Option<Option<Term>>),
    NumericExtreme {
        extreme: Option<NumericValue>,
        rank: NumericRank,
        wanted: Ordering,
    },
    Sample(Option<Term>),
    GroupConcat {
        separator: Option<Expression>,
        concat: Option<String>,
        /// `Some(None)` once two contributions disagree on the language
        language: Option<Option<String>>,
    },
    Median {
        values: Vec<Term>,
        incomparable: bool,
    },
    Mode {
        counts: FxHashMap<Term, usize>,
        order: Vec<Term>,
        unbound: usize,
    },
    All(bool),
    Any(bool),
    None(bool),
    Ended,
}

impl AggregateAccumulator {
    fn start(aggregate: &AggregateExpression) -> Self {
        let (expression, distinct, state) = match aggregate {
            AggregateExpression::CountSolutions { distinct } => {
                return Self {
                    expression: None,
                    seen_values: None,
                    seen_bindings: distinct.then(FxHashSet::default),
                    state: AccumulatorState::Count(0),
                    value: None,
                };
            }
            AggregateExpression::FunctionCall {
                name,
                expression,
                distinct,
            } => (
                expression.clone(),
                *distinct,
                match name {
                    AggregateFunction::Count => AccumulatorState::Count(0),
                    AggregateFunction::Sum => AccumulatorState::Sum(Some(NumericTotals::default())),
                    AggregateFunction::Avg => AccumulatorState::Avg {
                        totals: Some(NumericTotals::default()),
                        count: 0,
                    },
                    AggregateFunction::Min => AccumulatorState::Min(Some(None)),
                    AggregateFunction::Max => AccumulatorState::Max(Some(None)),
                    AggregateFunction::NumericMin => AccumulatorState::NumericExtreme {
                        extreme: None,
                        rank: NumericRank::Integer,
                        wanted: Ordering::Less,
                    },
                    AggregateFunction::NumericMax => AccumulatorState::NumericExtreme {
                        extreme: None,
                        rank: NumericRank::Integer,
                        wanted: Ordering::Greater,
                    },
                    AggregateFunction::Sample => AccumulatorState::Sample(None),
                    AggregateFunction::GroupConcat { separator } => AccumulatorState::GroupConcat {
                        separator: separator.clone(),
                        concat: Some(String::new()),
                        language: None,
                    },
                    AggregateFunction::Median => AccumulatorState::Median {
                        values: Vec::new(),
                        incomparable: false,
                    },
                    AggregateFunction::Mode => AccumulatorState::Mode {
                        counts: FxHashMap::default(),
                        order: Vec::new(),
                        unbound: 0,
                    },
                    AggregateFunction::All => AccumulatorState::All(true),
                    AggregateFunction::Any => AccumulatorState::Any(false),
                    AggregateFunction::None => AccumulatorState::None(true),
                },
            ),
        };
        Self {
            expression: Some(expression),
            seen_values: distinct.then(FxHashSet::default),
            seen_bindings: None,
            state,
            value: None,
        }
    }

    /// Feeds one binding of the group.
    ///
    /// Returns `false` once the aggregate is poisoned: it will produce no value and does not need
    /// to be fed anymore.
    pub fn accept(&mut self, binding: &Binding, context: &EvaluationContext<'_>) -> bool {
        let Some(expression) = &self.expression else {
            // COUNT(*)
            if let AccumulatorState::Count(count) = &mut self.state {
                if self
                    .seen_bindings
                    .as_mut()
                    .is_none_or(|seen| seen.insert(binding.clone()))
                {
                    *count += 1;
                }
            }
            return true;
        };
        let value = context
            .expression_evaluator()
            .evaluate(expression, binding, context)
            .ok();
        let duplicate = match (&mut self.seen_values, &value) {
            (Some(seen), Some(value)) => !seen.insert(value.clone()),
            _ => false,
        };
        if duplicate {
            return !self.is_poisoned();
        }
        match &mut self.state {
            AccumulatorState::Count(count) => {
                if value.is_some() {
                    *count += 1;
                }
            }
            AccumulatorState::Sum(totals) => {
                if let Some(t) = totals {
                    match value.as_ref().and_then(NumericValue::from_term) {
                        Some(value) => t.add(value),
                        None => *totals = None,
                    }
                }
            }
            AccumulatorState::Avg { totals, count } => {
                if let Some(t) = totals {
                    match value.as_ref().and_then(NumericValue::from_term) {
                        Some(value) => {
                            t.add(value);
                            *count += 1;
                        }
                        None => *totals = None,
                    }
                }
            }
            AccumulatorState::Min(current) => {
                update_extreme(current, value, Ordering::Less);
            }
            AccumulatorState::Max(current) => {
                update_extreme(current, value, Ordering::Greater);
            }
            AccumulatorState::NumericExtreme {
                extreme,
                rank,
                wanted,
            } => {
                if let Some(value) = value.as_ref().and_then(NumericValue::from_term) {
                    // NaN is not comparable and skipped like a non-numeric value
                    let keep = match extreme {
                        Some(current) => value.compare(*current).map(|o| o == *wanted),
                        None => value.compare(value).map(|_| true),
                    };
                    if let Some(keep) = keep {
                        *rank = (*rank).max(value.rank());
                        if keep {
                            *extreme = Some(value);
                        }
                    }
                }
            }
            AccumulatorState::Sample(sample) => {
                if sample.is_none() {
                    *sample = value;
                }
            }
            AccumulatorState::GroupConcat {
                separator,
                concat,
                language,
            } => {
                let (Some(concat), Some((value, value_language))) =
                    (concat.as_mut(), value.as_ref().and_then(to_string_and_language))
                else {
                    return true;
                };
                if let Some(lang) = language {
                    if lang.as_deref() != value_language {
                        *language = Some(None);
                    }
                    match separator {
                        Some(separator) => {
                            if let Some((separator, _)) = context
                                .expression_evaluator()
                                .evaluate(separator, binding, context)
                                .ok()
                                .as_ref()
                                .and_then(to_string_and_language)
                            {
                                concat.push_str(separator);
                            }
                        }
                        None => concat.push(' '),
                    }
                } else {
                    *language = Some(value_language.map(ToOwned::to_owned));
                }
                concat.push_str(value);
            }
            AccumulatorState::Median {
                values,
                incomparable,
            } => {
                if let Some(value) = value {
                    if !*incomparable {
                        let position = values.partition_point(|probe| {
                            match compare_terms(probe, &value) {
                                Some(ordering) => ordering != Ordering::Greater,
                                None => {
                                    *incomparable = true;
                                    false
                                }
                            }
                        });
                        values.insert(position, value);
                    }
                }
            }
            AccumulatorState::Mode {
                counts,
                order,
                unbound,
            } => match value {
                Some(value) => {
                    let count = counts.entry(value.clone()).or_insert(0);
                    if *count == 0 {
                        order.push(value);
                    }
                    *count += 1;
                }
                None => *unbound += 1,
            },
            AccumulatorState::All(all) => {
                // An error counts as false
                if !value.as_ref().is_some_and(|v| effective_boolean_value(v) == Ok(true)) {
                    *all = false;
                }
            }
            AccumulatorState::Any(any) => {
                if value.as_ref().is_some_and(|v| effective_boolean_value(v) == Ok(true)) {
                    *any = true;
                }
            }
            AccumulatorState::None(none) => {
                if value.as_ref().is_some_and(|v| effective_boolean_value(v) == Ok(true)) {
                    *none = false;
                }
            }
            AccumulatorState::Ended => (),
        }
        !self.is_poisoned()
    }

    fn is_poisoned(&self) -> bool {
        matches!(
            self.state,
            AccumulatorState::Sum(None)
                | AccumulatorState::Avg { totals: None, .. }
                | AccumulatorState::Min(None)
                | AccumulatorState::Max(None)
                | AccumulatorState::Median {
                    incomparable: true,
                    ..
                }
        )
    }

    /// Computes the aggregate value. Later calls to [`accept`](Self::accept) are ignored.
    pub fn end(&mut self) {
        let state = std::mem::replace(&mut self.state, AccumulatorState::Ended);
        self.value = match state {
            AccumulatorState::Count(count) => {
                i64::try_from(count).ok().map(|c| Literal::from(c).into())
            }
            AccumulatorState::Sum(totals) => totals.and_then(|t| t.total()).map(Into::into),
            AccumulatorState::Avg { totals, count } => {
                totals.and_then(|t| t.average(count)).map(Into::into)
            }
            AccumulatorState::Min(extreme) | AccumulatorState::Max(extreme) => extreme.flatten(),
            AccumulatorState::NumericExtreme { extreme, rank, .. } => extreme
                .and_then(|extreme| extreme.promote(rank))
                .map(Into::into),
            AccumulatorState::Sample(sample) => sample,
            AccumulatorState::GroupConcat {
                concat, language, ..
            } => concat.map(|concat| match language.flatten() {
                Some(language) => Literal::new_language_tagged_literal_unchecked(concat, language),
                None => Literal::new_simple_literal(concat),
            }
            .into()),
            AccumulatorState::Median {
                mut values,
                incomparable,
            } => {
                if incomparable || values.is_empty() {
                    None
                } else {
                    let middle = values.len() / 2;
                    Some(values.swap_remove(middle))
                }
            }
            AccumulatorState::Mode {
                counts,
                order,
                unbound,
            } => {
                let mut best: Option<(Term, usize)> = None;
                for value in order {
                    let count = counts.get(&value).copied().unwrap_or_default();
                    if best.as_ref().is_none_or(|(_, best)| count > *best) {
                        best = Some((value, count));
                    }
                }
                best.filter(|(_, count)| *count > unbound).map(|(v, _)| v)
            }
            AccumulatorState::All(b) | AccumulatorState::Any(b) | AccumulatorState::None(b) => {
                Some(Literal::from(b).into())
            }
            AccumulatorState::Ended => self.value.take(),
        };
    }

    pub fn value(&self) -> Option<&Term> {
        self.value.as_ref()
    }
}

/// Keeps the minimum (`Ordering::Less`) or maximum (`Ordering::Greater`), giving up on incomparable values.
fn update_extreme(current: &mut Option<Option<Term>>, value: Option<Term>, wanted: Ordering) {
    let (Some(slot), Some(value)) = (current.as_mut(), value) else {
        return;
    };
    match slot {
        None => *slot = Some(value),
        Some(extreme) => match compare_terms(&value, extreme) {
            Some(ordering) if ordering == wanted => *extreme = value,
            Some(_) => (),
            None => *current = None,
        },
    }
}

fn to_string_and_language(term: &Term) -> Option<(&str, Option<&str>)> {
    match term {
        // Typed literals contribute their lexical form
        Term::Literal(literal) => Some((literal.value(), literal.language())),
        Term::NamedNode(node) => Some((node.as_str(), None)),
        _ => None,
    }
}

/// Groups `input` by the values of `keys` and computes the aggregates of each group.
///
/// Without keys there is always exactly one group, even on an empty input.
/// Aggregates without a value are explicitly unbound in the output bindings.
pub(crate) fn group(
    input: impl IntoIterator<Item = Result<Binding, QueryEvaluationError>>,
    keys: &[Variable],
    aggregates: &[(Variable, AggregateExpression)],
    context: &EvaluationContext<'_>,
) -> Result<Vec<Binding>, QueryEvaluationError> {
    let max_groups = context.limits().max_groups;
    let mut groups = FxHashMap::<Vec<Option<Term>>, usize>::default();
    let mut accumulators = Vec::<(Vec<Option<Term>>, Vec<(AggregateAccumulator, bool)>)>::new();
    let new_accumulators = || {
        aggregates
            .iter()
            .map(|(_, aggregate)| (aggregate.start(), true))
            .collect::<Vec<_>>()
    };
    if keys.is_empty() {
        groups.insert(Vec::new(), 0);
        accumulators.push((Vec::new(), new_accumulators()));
    }
    for binding in input {
        let binding = binding?;
        context.check()?;
        let key = keys
            .iter()
            .map(|v| binding.get(v).cloned())
            .collect::<Vec<_>>();
        let id = if let Some(id) = groups.get(&key) {
            *id
        } else {
            if let Some(limit) = max_groups {
                if accumulators.len() >= limit {
                    return Err(QueryEvaluationError::TooManyGroups { limit });
                }
            }
            groups.insert(key.clone(), accumulators.len());
            accumulators.push((key, new_accumulators()));
            accumulators.len() - 1
        };
        for (accumulator, active) in &mut accumulators[id].1 {
            if *active {
                *active = accumulator.accept(&binding, context);
            }
        }
    }
    debug!(
        groups = accumulators.len(),
        keys = ?keys,
        aggregates = aggregates.len(),
        "grouping done"
    );
    let mut output = Vec::with_capacity(accumulators.len());
    for (key, group_accumulators) in accumulators {
        context.check()?;
        let mut binding = Binding::default();
        for (variable, value) in keys.iter().zip(key) {
            binding = match value {
                Some(value) => binding.with(variable.clone(), value),
                None => binding.with_unbound(variable.clone()),
            };
        }
        for ((variable, _), (mut accumulator, _)) in aggregates.iter().zip(group_accumulators) {
            accumulator.end();
            binding = match accumulator.value() {
                Some(value) => binding.with(variable.clone(), value.clone()),
                None => binding.with_unbound(variable.clone()),
            };
        }
        output.push(binding);
    }
    Ok(output)
}

#[cfg(test)]
#[expect(clippy::panic_in_result_fn)]
mod tests {
    use super::*;
    use crate::QueryEvaluator;
    use oxrdf::vocab::xsd;
    use oxrdf::{Dataset, NamedNode};

    fn run(
        aggregate: &AggregateExpression,
        values: Vec<Option<Term>>,
    ) -> Result<Option<Term>, Box<dyn std::error::Error>> {
        let dataset = Dataset::new();
        let context = QueryEvaluator::new().start(&dataset);
        let x = Variable::new("x")?;
        let mut accumulator = aggregate.start();
        for value in values {
            let binding = match value {
                Some(value) => Binding::default().with(x.clone(), value),
                None => Binding::default().with_unbound(x.clone()),
            };
            if !accumulator.accept(&binding, &context) {
                break;
            }
        }
        accumulator.end();
        Ok(accumulator.value().cloned())
    }

    fn x() -> Expression {
        Variable::new_unchecked("x").into()
    }

    #[test]
    fn test_sum_promotes_to_decimal() -> Result<(), Box<dyn std::error::Error>> {
        let sum = run(
            &AggregateExpression::new(AggregateFunction::Sum, x()),
            vec![
                Some(Literal::from(1).into()),
                Some(Literal::new_typed_literal("2.5", xsd::DECIMAL).into()),
            ],
        )?;
        assert_eq!(
            sum,
            Some(Literal::new_typed_literal("3.5", xsd::DECIMAL).into())
        );
        Ok(())
    }

    #[test]
    fn test_sum_is_poisoned_by_non_numeric() -> Result<(), Box<dyn std::error::Error>> {
        let sum = run(
            &AggregateExpression::new(AggregateFunction::Sum, x()),
            vec![
                Some(Literal::from(1).into()),
                Some(Literal::from("a").into()),
                Some(Literal::from(2).into()),
            ],
        )?;
        assert_eq!(sum, None);
        Ok(())
    }

    #[test]
    fn test_empty_sum_and_avg_are_zero() -> Result<(), Box<dyn std::error::Error>> {
        for function in [AggregateFunction::Sum, AggregateFunction::Avg] {
            let value = run(&AggregateExpression::new(function, x()), Vec::new())?;
            assert_eq!(value, Some(Literal::from(0).into()));
        }
        Ok(())
    }

    #[test]
    fn test_avg_of_integers_is_decimal() -> Result<(), Box<dyn std::error::Error>> {
        let avg = run(
            &AggregateExpression::new(AggregateFunction::Avg, x()),
            vec![Some(Literal::from(1).into()), Some(Literal::from(2).into())],
        )?;
        assert_eq!(
            avg,
            Some(Literal::new_typed_literal("1.5", xsd::DECIMAL).into())
        );
        Ok(())
    }

    #[test]
    fn test_count_skips_unbound_and_distinct() -> Result<(), Box<dyn std::error::Error>> {
        let values = vec![
            Some(Literal::from(1).into()),
            None,
            Some(Literal::from(1).into()),
        ];
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::Count, x()),
                values.clone()
            )?,
            Some(Literal::from(2).into())
        );
        assert_eq!(
            run(
                &AggregateExpression::distinct(AggregateFunction::Count, x()),
                values.clone()
            )?,
            Some(Literal::from(1).into())
        );
        assert_eq!(
            run(&AggregateExpression::CountSolutions { distinct: false }, values)?,
            Some(Literal::from(3).into())
        );
        Ok(())
    }

    #[test]
    fn test_min_max() -> Result<(), Box<dyn std::error::Error>> {
        let values = vec![
            Some(Literal::from(3).into()),
            Some(Literal::new_typed_literal("1.5", xsd::DECIMAL).into()),
            None,
            Some(Literal::from(2).into()),
        ];
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::Min, x()),
                values.clone()
            )?,
            Some(Literal::new_typed_literal("1.5", xsd::DECIMAL).into())
        );
        assert_eq!(
            run(&AggregateExpression::new(AggregateFunction::Max, x()), values)?,
            Some(Literal::from(3).into())
        );
        Ok(())
    }

    #[test]
    fn test_max_of_incomparable_is_unbound() -> Result<(), Box<dyn std::error::Error>> {
        let max = run(
            &AggregateExpression::new(AggregateFunction::Max, x()),
            vec![
                Some(Literal::from(1).into()),
                Some(NamedNode::new("http://example.com/a")?.into()),
                Some(Literal::from(5).into()),
            ],
        )?;
        assert_eq!(max, None);
        Ok(())
    }

    #[test]
    fn test_numeric_min_max_ignore_non_numeric_values() -> Result<(), Box<dyn std::error::Error>> {
        let values = vec![
            Some(Literal::from(1).into()),
            Some(NamedNode::new("http://example.com/a")?.into()),
            Some(Literal::from("z").into()),
            None,
            Some(Literal::from(5).into()),
            Some(Literal::new_typed_literal("2.5", xsd::DECIMAL).into()),
        ];
        // The result is promoted to the highest numeric type seen
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::NumericMax, x()),
                values.clone()
            )?,
            Some(Literal::new_typed_literal("5", xsd::DECIMAL).into())
        );
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::NumericMin, x()),
                values
            )?,
            Some(Literal::new_typed_literal("1", xsd::DECIMAL).into())
        );
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::NumericMax, x()),
                vec![
                    Some(Literal::from(2).into()),
                    Some(Literal::new_typed_literal("NaN", xsd::DOUBLE).into()),
                    Some(Literal::from(7).into()),
                ]
            )?,
            Some(Literal::from(7).into())
        );
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::NumericMin, x()),
                vec![Some(Literal::from("a").into()), None]
            )?,
            None
        );
        Ok(())
    }

    #[test]
    fn test_sample_takes_first_value() -> Result<(), Box<dyn std::error::Error>> {
        let sample = run(
            &AggregateExpression::new(AggregateFunction::Sample, x()),
            vec![
                None,
                Some(Literal::from("a").into()),
                Some(Literal::from("b").into()),
            ],
        )?;
        assert_eq!(sample, Some(Literal::from("a").into()));
        Ok(())
    }

    #[test]
    fn test_group_concat_skips_unbound() -> Result<(), Box<dyn std::error::Error>> {
        let concat = run(
            &AggregateExpression::new(
                AggregateFunction::GroupConcat {
                    separator: Some(Literal::from(",").into()),
                },
                x(),
            ),
            vec![
                Some(Literal::from("a").into()),
                None,
                Some(Literal::from("b").into()),
            ],
        )?;
        assert_eq!(concat, Some(Literal::from("a,b").into()));
        Ok(())
    }

    #[test]
    fn test_group_concat_default_separator_and_language() -> Result<(), Box<dyn std::error::Error>>
    {
        let concat = run(
            &AggregateExpression::new(AggregateFunction::GroupConcat { separator: None }, x()),
            vec![
                Some(Literal::new_language_tagged_literal("a", "en")?.into()),
                Some(Literal::new_language_tagged_literal("b", "en")?.into()),
            ],
        )?;
        assert_eq!(
            concat,
            Some(Literal::new_language_tagged_literal("a b", "en")?.into())
        );
        Ok(())
    }

    #[test]
    fn test_median_and_mode() -> Result<(), Box<dyn std::error::Error>> {
        let values = vec![
            Some(Literal::from(4).into()),
            Some(Literal::from(1).into()),
            Some(Literal::from(4).into()),
            Some(Literal::from(2).into()),
        ];
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::Median, x()),
                values.clone()
            )?,
            Some(Literal::from(4).into())
        );
        assert_eq!(
            run(&AggregateExpression::new(AggregateFunction::Mode, x()), values)?,
            Some(Literal::from(4).into())
        );
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::Mode, x()),
                vec![Some(Literal::from(1).into()), None]
            )?,
            None
        );
        Ok(())
    }

    #[test]
    fn test_boolean_aggregates() -> Result<(), Box<dyn std::error::Error>> {
        let values = vec![
            Some(Literal::from(true).into()),
            Some(Literal::from(false).into()),
        ];
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::All, x()),
                values.clone()
            )?,
            Some(Literal::from(false).into())
        );
        assert_eq!(
            run(
                &AggregateExpression::new(AggregateFunction::Any, x()),
                values.clone()
            )?,
            Some(Literal::from(true).into())
        );
        assert_eq!(
            run(&AggregateExpression::new(AggregateFunction::None, x()), values)?,
            Some(Literal::from(false).into())
        );
        Ok(())
    }
}
