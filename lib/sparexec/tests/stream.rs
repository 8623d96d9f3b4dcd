#![cfg(all(test, feature = "async"))]
#![allow(clippy::panic_in_result_fn)]

use futures::executor::block_on;
use futures::{StreamExt, TryStreamExt};
use oxrdf::{Dataset, GraphName, NamedNode, Quad, Variable};
use sparexec::{
    CancellationToken, GraphPattern, Multiset, PathExpression, QueryEvaluationError,
    QueryEvaluator,
};
use std::error::Error;

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn cycle() -> Dataset {
    [("1", "2"), ("2", "3"), ("3", "1")]
        .into_iter()
        .map(|(s, o)| Quad::new(ex(s), ex("next"), ex(o), GraphName::DefaultGraph))
        .collect()
}

#[test]
fn stream_yields_the_same_solutions() -> Result<(), Box<dyn Error>> {
    let dataset = cycle();
    let context = QueryEvaluator::new().start(&dataset);
    let pattern = GraphPattern::path(
        Variable::new("s")?,
        PathExpression::one_or_more(ex("next")),
        Variable::new("o")?,
    );
    let streamed = block_on(context.evaluate_stream(&pattern).try_collect::<Vec<_>>())?;
    assert_eq!(streamed.len(), 9);
    assert_eq!(
        streamed.into_iter().collect::<Multiset>(),
        context.evaluate(&pattern)?
    );
    Ok(())
}

#[test]
fn cancelled_stream() -> Result<(), Box<dyn Error>> {
    let dataset = cycle();
    let token = CancellationToken::new();
    let context = QueryEvaluator::new()
        .with_cancellation_token(token.clone())
        .start(&dataset);
    let pattern = GraphPattern::path(
        Variable::new("s")?,
        PathExpression::zero_or_more(ex("next")),
        Variable::new("o")?,
    );
    let mut stream = context.evaluate_stream(&pattern);
    assert!(matches!(block_on(stream.next()), Some(Ok(_))));
    token.cancel();
    assert!(matches!(
        block_on(stream.next()),
        Some(Err(QueryEvaluationError::Cancelled))
    ));
    Ok(())
}
