#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxrdf::{Dataset, Literal, NamedNode, Term, Variable};
use sparexec::{
    Binding, Expression, GraphPattern, JoinStrategy, Multiset, QueryEvaluationError,
    QueryEvaluator, QueryableDataset, TripleIter,
};
use std::error::Error;

fn var(name: &str) -> Variable {
    Variable::new_unchecked(name)
}

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn column(variable: &str, values: impl IntoIterator<Item = i64>) -> Multiset {
    values
        .into_iter()
        .map(|i| Binding::default().with(var(variable), Literal::from(i)))
        .collect()
}

/// Fails on every access, so that an operator touching it errors.
struct Unreachable;

impl QueryableDataset for Unreachable {
    fn triples_for_pattern<'a>(
        &'a self,
        _: Option<&Term>,
        _: Option<&Term>,
        _: Option<&Term>,
        _: oxrdf::GraphNameRef<'_>,
    ) -> TripleIter<'a> {
        Box::new(std::iter::once(Err(QueryEvaluationError::Dataset(
            "unreachable storage".into(),
        ))))
    }

    fn named_graphs(
        &self,
    ) -> Box<dyn Iterator<Item = Result<oxrdf::GraphName, QueryEvaluationError>> + '_> {
        Box::new(std::iter::empty())
    }
}

#[test]
fn cross_product_has_every_pair() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let left = column("x", 1..=3);
    let right = column("y", 1..=2);
    assert_eq!(left.join(&right, &context)?.len(), 6);
    assert_eq!(left.product(&right, &context)?.len(), 6);
    assert_eq!(right.join(&left, &context)?, left.join(&right, &context)?);
    Ok(())
}

#[test]
fn identity_and_null_are_neutral_and_absorbing() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let left = column("x", 1..=3);
    assert_eq!(left.join(&Multiset::Identity, &context)?, left);
    assert_eq!(Multiset::Identity.join(&left, &context)?, left);
    assert!(left.join(&Multiset::Null, &context)?.is_empty());
    assert!(Multiset::Null.join(&left, &context)?.is_empty());
    Ok(())
}

#[test]
fn strategies_agree_on_partially_bound_bindings() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let (x, y, z) = (var("x"), var("y"), var("z"));
    let left = Multiset::new([
        Binding::default()
            .with(x.clone(), Literal::from(1))
            .with(y.clone(), ex("a")),
        Binding::default()
            .with(x.clone(), Literal::from(2))
            .with_unbound(y.clone()),
        Binding::default().with(x.clone(), Literal::from(3)),
    ]);
    let right = Multiset::new([
        Binding::default()
            .with(y.clone(), ex("a"))
            .with(z.clone(), Literal::from(1)),
        Binding::default()
            .with(y.clone(), ex("b"))
            .with(z.clone(), Literal::from(2)),
        Binding::default().with(z.clone(), Literal::from(3)),
        Binding::default()
            .with_unbound(y)
            .with(z, Literal::from(4)),
    ]);
    let expected = left.join_with(&right, Some(JoinStrategy::NestedLoop), &context)?;
    assert_eq!(expected.len(), 11);
    for strategy in [
        JoinStrategy::CrossProduct,
        JoinStrategy::FixedHash,
        JoinStrategy::FloatingHash,
    ] {
        assert_eq!(
            left.join_with(&right, Some(strategy.clone()), &context)?,
            expected,
            "{strategy} disagrees with NestedLoop"
        );
    }
    assert_eq!(left.join(&right, &context)?, expected);
    Ok(())
}

#[test]
fn strategy_selection() {
    let y = var("y");
    let bound = Binding::default().with(y.clone(), ex("a"));
    let unbound = Binding::default().with_unbound(y.clone());
    assert_eq!(
        JoinStrategy::select(&[], &[bound.clone(), bound.clone()]),
        JoinStrategy::CrossProduct
    );
    assert_eq!(
        JoinStrategy::select(&[y.clone()], &[bound.clone()]),
        JoinStrategy::NestedLoop
    );
    assert_eq!(
        JoinStrategy::select(&[y.clone()], &[bound.clone(), bound.clone()]),
        JoinStrategy::FixedHash
    );
    assert_eq!(
        JoinStrategy::select(&[y], &[bound, unbound]),
        JoinStrategy::FloatingHash
    );
    assert_eq!(
        JoinStrategy::NestedLoop.non_existence().non_existence(),
        JoinStrategy::NonExistence(Box::new(JoinStrategy::NestedLoop))
    );
}

#[test]
fn left_join_unbinds_missing_right_variables() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let (x, y) = (var("x"), var("y"));
    let left = column("x", 1..=2);
    let right = Multiset::new([Binding::default()
        .with(x.clone(), Literal::from(1))
        .with(y.clone(), ex("a"))]);

    let solutions = left.left_join(&right, None, &context)?;
    assert_eq!(solutions.len(), 2);
    for solution in solutions.iter() {
        if solution.get(&x) == Some(&Literal::from(1).into()) {
            assert_eq!(solution.get(&y), Some(&ex("a").into()));
        } else {
            assert!(solution.is_unbound(&y));
        }
    }

    let filter = Expression::Equal(Box::new(y.clone().into()), Box::new(ex("b").into()));
    let filtered = left.left_join(&right, Some(&filter), &context)?;
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|b| b.is_unbound(&y)));
    Ok(())
}

#[test]
fn minus_of_empty_is_identity() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let left = column("x", 1..=3);
    assert_eq!(left.minus(&Multiset::Null, &context)?, left);
    assert!(Multiset::Null.minus(&left, &context)?.is_empty());
    Ok(())
}

#[test]
fn minus_without_common_variable_differs_from_not_exists() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let left = column("x", 1..=3);
    let right = column("y", 1..=2);
    assert_eq!(left.minus(&right, &context)?, left);
    assert!(left.exists_join(&right, false).is_empty());
    assert_eq!(left.exists_join(&right, true), left);
    Ok(())
}

#[test]
fn minus_removes_compatible_bindings() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let left = column("x", 1..=3);
    let right = column("x", [2]);
    let expected = column("x", [1, 3]);
    assert_eq!(left.minus(&right, &context)?, expected);
    for strategy in [
        JoinStrategy::NestedLoop,
        JoinStrategy::FixedHash,
        JoinStrategy::FloatingHash,
    ] {
        assert_eq!(
            left.minus_with(&right, Some(strategy.clone()), &context)?,
            expected,
            "{strategy} disagrees"
        );
    }
    assert_eq!(left.exists_join(&right, false), expected);
    assert_eq!(left.exists_join(&right, true), column("x", [2]));
    Ok(())
}

#[test]
fn minus_needs_a_shared_bound_variable() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let (x, y) = (var("x"), var("y"));
    let left = Multiset::new([Binding::default()
        .with(x.clone(), Literal::from(1))
        .with_unbound(y.clone())]);
    let right = Multiset::new([Binding::default()
        .with_unbound(x)
        .with(y, Literal::from(2))]);
    // Compatible but sharing no bound variable
    assert_eq!(left.minus(&right, &context)?, left);
    Ok(())
}

#[test]
fn union_concatenates_bags() {
    let left = column("x", [1, 2]);
    let right = column("x", [2, 3]);
    let union = left.union(&right);
    assert_eq!(union, column("x", [1, 2, 2, 3]));
    assert_eq!(left.union(&Multiset::Null), left);
    assert_eq!(Multiset::Null.union(&right), right);
}

#[test]
fn lazy_and_materialised_evaluation_agree() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let (x, y) = (var("x"), var("y"));
    let values = |variables: Vec<Variable>, rows: Vec<Vec<Option<Term>>>| GraphPattern::Values {
        variables,
        bindings: rows,
    };
    let one = || Some(Term::from(Literal::from(1)));
    let two = || Some(Term::from(Literal::from(2)));
    let left = values(vec![x.clone()], vec![vec![one()], vec![two()], vec![None]]);
    let right = values(
        vec![x.clone(), y.clone()],
        vec![vec![one(), one()], vec![None, two()]],
    );
    for pattern in [
        GraphPattern::join(left.clone(), right.clone()),
        GraphPattern::Join {
            left: Box::new(left.clone()),
            right: Box::new(right.clone()),
            strategy: Some(JoinStrategy::FloatingHash),
        },
        GraphPattern::left_join(left.clone(), right.clone(), None),
        GraphPattern::minus(left.clone(), right.clone()),
        GraphPattern::union(left.clone(), right.clone()),
    ] {
        let lazy = context
            .evaluate_iter(&pattern)
            .collect::<Result<Multiset, _>>()?;
        assert_eq!(lazy, context.evaluate(&pattern)?);
    }
    Ok(())
}

#[test]
fn empty_left_side_skips_right_side() -> Result<(), Box<dyn Error>> {
    let context = QueryEvaluator::new().start(&Unreachable);
    let empty = GraphPattern::Values {
        variables: vec![var("x")],
        bindings: Vec::new(),
    };
    let storage = GraphPattern::path(var("x"), ex("p"), var("y"));
    for pattern in [
        GraphPattern::join(empty.clone(), storage.clone()),
        GraphPattern::left_join(empty.clone(), storage.clone(), None),
        GraphPattern::minus(empty.clone(), storage.clone()),
    ] {
        assert!(context.evaluate(&pattern)?.is_empty());
        assert_eq!(context.evaluate_iter(&pattern).count(), 0);
    }
    assert!(matches!(
        context.evaluate(&GraphPattern::join(storage, empty)),
        Err(QueryEvaluationError::Dataset(_))
    ));
    Ok(())
}

#[test]
fn optional_over_an_empty_right_side() -> Result<(), Box<dyn Error>> {
    let dataset = Dataset::new();
    let context = QueryEvaluator::new().start(&dataset);
    let pattern = GraphPattern::left_join(
        GraphPattern::Values {
            variables: vec![var("x")],
            bindings: vec![vec![Some(Literal::from(1).into())]],
        },
        GraphPattern::path(var("x"), ex("p"), var("y")),
        None,
    );
    let expected = Multiset::new([Binding::default()
        .with(var("x"), Literal::from(1))
        .with_unbound(var("y"))]);
    assert_eq!(context.evaluate(&pattern)?, expected);
    assert_eq!(
        context
            .evaluate_iter(&pattern)
            .collect::<Result<Multiset, _>>()?,
        expected
    );
    Ok(())
}
