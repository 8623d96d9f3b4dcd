#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxrdf::{Dataset, GraphName, NamedNode, Quad, Term, Variable};
use sparexec::{
    EvaluationContext, GraphPattern, PathEvaluator, PathExpression, PathResult, QueryEvaluator,
};
use std::collections::HashSet;
use std::error::Error;

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn node(name: &str) -> Term {
    ex(name).into()
}

/// `1 -> 2 -> 3 -> 1` along `next`, `a -> b` along `other` and `a -> c` along `third`.
fn dataset() -> Dataset {
    [
        ("1", "next", "2"),
        ("2", "next", "3"),
        ("3", "next", "1"),
        ("a", "other", "b"),
        ("a", "third", "c"),
    ]
    .into_iter()
    .map(|(s, p, o)| Quad::new(ex(s), ex(p), ex(o), GraphName::DefaultGraph))
    .collect()
}

fn evaluate(
    context: &EvaluationContext<'_>,
    path: &PathExpression,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Vec<PathResult>, Box<dyn Error>> {
    let start = start.map(node);
    let end = end.map(node);
    Ok(PathEvaluator::new(context.clone())
        .evaluate(path, start.as_ref(), end.as_ref())
        .collect::<Result<Vec<_>, _>>()?)
}

fn ends(results: &[PathResult]) -> HashSet<Term> {
    results.iter().map(|r| r.end.clone()).collect()
}

fn pairs(results: &[PathResult]) -> HashSet<(Term, Term)> {
    results
        .iter()
        .map(|r| (r.start.clone(), r.end.clone()))
        .collect()
}

fn nodes<const N: usize>(names: [&str; N]) -> HashSet<Term> {
    names.into_iter().map(node).collect()
}

#[test]
fn one_or_more_terminates_on_cycles() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let results = evaluate(
        &context,
        &PathExpression::one_or_more(ex("next")),
        Some("1"),
        None,
    )?;
    assert_eq!(results.len(), 3);
    assert_eq!(ends(&results), nodes(["1", "2", "3"]));
    for result in &results {
        assert!(!result.visited.contains(&result.end));
    }
    Ok(())
}

#[test]
fn zero_or_more_includes_the_start_once() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let results = evaluate(
        &context,
        &PathExpression::zero_or_more(ex("next")),
        Some("1"),
        None,
    )?;
    assert_eq!(results.len(), 3);
    assert_eq!(ends(&results), nodes(["1", "2", "3"]));
    for result in &results {
        assert!(!result.visited.contains(&result.end));
    }

    // A node without outgoing edge still reaches itself
    let results = evaluate(
        &context,
        &PathExpression::zero_or_more(ex("next")),
        Some("b"),
        None,
    )?;
    assert_eq!(ends(&results), nodes(["b"]));
    Ok(())
}

#[test]
fn open_zero_or_more_pairs_every_node() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let results = evaluate(
        &context,
        &PathExpression::zero_or_more(ex("next")),
        None,
        None,
    )?;
    let pairs = pairs(&results);
    assert_eq!(results.len(), pairs.len());
    // 3x3 in the cycle and the 3 zero-length paths of a, b and c
    assert_eq!(pairs.len(), 12);
    assert!(pairs.contains(&(node("c"), node("c"))));
    assert!(pairs.contains(&(node("3"), node("2"))));
    Ok(())
}

#[test]
fn bounded_repetition() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let exactly_two = evaluate(
        &context,
        &PathExpression::between(ex("next"), 2, 2),
        Some("1"),
        None,
    )?;
    assert_eq!(ends(&exactly_two), nodes(["3"]));

    let two_or_three = evaluate(
        &context,
        &PathExpression::between(ex("next"), 2, 3),
        Some("1"),
        None,
    )?;
    assert_eq!(two_or_three.len(), 2);
    assert_eq!(ends(&two_or_three), nodes(["1", "3"]));

    let nothing = evaluate(
        &context,
        &PathExpression::between(ex("next"), 0, 0),
        Some("1"),
        None,
    )?;
    assert_eq!(ends(&nothing), nodes(["1"]));
    Ok(())
}

#[test]
fn inverse_swaps_the_ends() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let next = PathExpression::from(ex("next"));
    assert_eq!(
        ends(&evaluate(&context, &next.inverse(), Some("2"), None)?),
        nodes(["1"])
    );

    let path = PathExpression::Sequence(
        Box::new(next.clone()),
        Box::new(PathExpression::ZeroOrOne(Box::new(next.clone()))),
    );
    assert_eq!(path.inverse().inverse(), path);
    let forward = pairs(&evaluate(&context, &path, None, None)?);
    let backward = pairs(&evaluate(&context, &path.inverse(), None, None)?)
        .into_iter()
        .map(|(start, end)| (end, start))
        .collect::<HashSet<_>>();
    assert_eq!(forward, backward);

    // Only the end bound
    let to_three = evaluate(&context, &path, None, Some("3"))?;
    assert_eq!(
        to_three.iter().map(|r| r.start.clone()).collect::<HashSet<_>>(),
        nodes(["1", "2"])
    );
    assert!(to_three.iter().all(|r| r.end == node("3")));
    Ok(())
}

#[test]
fn sequence_alternative_and_zero_or_one() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let next = PathExpression::from(ex("next"));
    let sequence = PathExpression::Sequence(Box::new(next.clone()), Box::new(next.clone()));
    assert_eq!(
        ends(&evaluate(&context, &sequence, Some("1"), None)?),
        nodes(["3"])
    );

    let alternative = PathExpression::Alternative(
        Box::new(ex("other").into()),
        Box::new(ex("third").into()),
    );
    assert_eq!(
        ends(&evaluate(&context, &alternative, Some("a"), None)?),
        nodes(["b", "c"])
    );

    let optional = PathExpression::ZeroOrOne(Box::new(next));
    let results = evaluate(&context, &optional, Some("1"), None)?;
    assert_eq!(results.len(), 2);
    assert_eq!(ends(&results), nodes(["1", "2"]));
    Ok(())
}

#[test]
fn negated_property_set() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let not_other = PathExpression::NegatedPropertySet(vec![ex("other")]);
    assert_eq!(
        ends(&evaluate(&context, &not_other, Some("a"), None)?),
        nodes(["c"])
    );
    assert_eq!(
        ends(&evaluate(&context, &not_other.inverse(), Some("c"), None)?),
        nodes(["a"])
    );
    let open = evaluate(&context, &not_other, None, None)?;
    assert_eq!(open.len(), 4);
    Ok(())
}

#[test]
fn both_ends_bound() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let plus = PathExpression::one_or_more(ex("next"));
    assert_eq!(evaluate(&context, &plus, Some("1"), Some("1"))?.len(), 1);
    assert_eq!(evaluate(&context, &plus, Some("1"), Some("3"))?.len(), 1);
    assert!(evaluate(&context, &plus, Some("1"), Some("a"))?.is_empty());
    Ok(())
}

#[test]
fn path_pattern_with_the_same_variable_at_both_ends() -> Result<(), Box<dyn Error>> {
    let dataset = dataset();
    let context = QueryEvaluator::new().start(&dataset);
    let x = Variable::new("x")?;
    let loops = GraphPattern::path(x.clone(), PathExpression::one_or_more(ex("next")), x.clone());
    let solutions = context.evaluate(&loops)?;
    assert_eq!(solutions.len(), 3);
    assert_eq!(
        solutions
            .iter()
            .filter_map(|b| b.get(&x).cloned())
            .collect::<HashSet<_>>(),
        nodes(["1", "2", "3"])
    );
    assert_eq!(context.evaluate_iter(&loops).count(), 3);

    let single = GraphPattern::path(x.clone(), ex("next"), x);
    assert!(context.evaluate(&single)?.is_empty());
    Ok(())
}

#[test]
fn paths_are_matched_against_the_active_graph() -> Result<(), Box<dyn Error>> {
    let g1 = ex("g1");
    let g2 = ex("g2");
    let dataset = Dataset::from_iter([
        Quad::new(ex("1"), ex("next"), ex("2"), g1.clone()),
        Quad::new(ex("2"), ex("next"), ex("3"), g2.clone()),
        Quad::new(ex("3"), ex("next"), ex("4"), GraphName::DefaultGraph),
    ]);
    let context = QueryEvaluator::new().start(&dataset);
    let (g, s, o) = (Variable::new("g")?, Variable::new("s")?, Variable::new("o")?);
    let path = PathExpression::one_or_more(ex("next"));

    let in_default = context.evaluate(&GraphPattern::path(s.clone(), path.clone(), o.clone()))?;
    assert_eq!(in_default.len(), 1);

    let in_g1 = context.evaluate(&GraphPattern::Graph {
        name: g1.clone().into(),
        inner: Box::new(GraphPattern::path(s.clone(), path.clone(), o.clone())),
    })?;
    assert_eq!(in_g1.len(), 1);
    assert!(in_g1.iter().all(|b| b.get(&s) == Some(&node("1"))));

    let in_all = GraphPattern::Graph {
        name: g.clone().into(),
        inner: Box::new(GraphPattern::path(s.clone(), path, o)),
    };
    let solutions = context.evaluate(&in_all)?;
    assert_eq!(solutions.len(), 2);
    assert_eq!(
        solutions
            .iter()
            .filter_map(|b| b.get(&g).cloned())
            .collect::<HashSet<_>>(),
        HashSet::from([g1.into(), g2.into()])
    );
    assert_eq!(context.evaluate_iter(&in_all).count(), 2);
    Ok(())
}
