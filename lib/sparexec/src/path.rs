//! Property path evaluation.

use crate::context::EvaluationContext;
use crate::error::QueryEvaluationError;
use oxrdf::{NamedNode, Term};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fmt;
use std::iter::once;
use std::rc::Rc;
use tracing::debug;

/// A [property path expression](https://www.w3.org/TR/sparql11-query/#defn_PropertyPathExpr)
/// extended with bounded repetition `{min,max}`.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum PathExpression {
    /// A single step along a predicate
    Predicate(NamedNode),
    /// `^path`
    Inverse(Box<Self>),
    /// `a/b`
    Sequence(Box<Self>, Box<Self>),
    /// `a|b`
    Alternative(Box<Self>, Box<Self>),
    /// `path?`
    ZeroOrOne(Box<Self>),
    /// `path{min,max}`, `max = None` meaning unbounded. `path+` is `{1,}` and `path*` is `{0,}`.
    Repeat {
        path: Box<Self>,
        min: usize,
        max: Option<usize>,
    },
    /// `!(p1|...|pn)`
    NegatedPropertySet(Vec<NamedNode>),
}

impl PathExpression {
    /// `path+`
    pub fn one_or_more(path: impl Into<Self>) -> Self {
        Self::Repeat {
            path: Box::new(path.into()),
            min: 1,
            max: None,
        }
    }

    /// `path*`
    pub fn zero_or_more(path: impl Into<Self>) -> Self {
        Self::Repeat {
            path: Box::new(path.into()),
            min: 0,
            max: None,
        }
    }

    /// `path{min,max}`
    pub fn between(path: impl Into<Self>, min: usize, max: usize) -> Self {
        Self::Repeat {
            path: Box::new(path.into()),
            min,
            max: Some(max),
        }
    }

    /// The path matching the same pairs with start and end swapped.
    ///
    /// The inversion is pushed down to the leaves: only predicates and negated property sets end up
    /// wrapped into [`PathExpression::Inverse`].
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Predicate(_) | Self::NegatedPropertySet(_) => Self::Inverse(Box::new(self.clone())),
            Self::Inverse(inner) => (**inner).clone(),
            Self::Sequence(a, b) => Self::Sequence(Box::new(b.inverse()), Box::new(a.inverse())),
            Self::Alternative(a, b) => {
                Self::Alternative(Box::new(a.inverse()), Box::new(b.inverse()))
            }
            Self::ZeroOrOne(inner) => Self::ZeroOrOne(Box::new(inner.inverse())),
            Self::Repeat { path, min, max } => Self::Repeat {
                path: Box::new(path.inverse()),
                min: *min,
                max: *max,
            },
        }
    }
}

impl From<NamedNode> for PathExpression {
    #[inline]
    fn from(predicate: NamedNode) -> Self {
        Self::Predicate(predicate)
    }
}

impl From<&spargebra::algebra::PropertyPathExpression> for PathExpression {
    fn from(path: &spargebra::algebra::PropertyPathExpression) -> Self {
        use spargebra::algebra::PropertyPathExpression;

        match path {
            PropertyPathExpression::NamedNode(p) => Self::Predicate(p.clone()),
            PropertyPathExpression::Reverse(p) => Self::Inverse(Box::new(p.as_ref().into())),
            PropertyPathExpression::Sequence(a, b) => {
                Self::Sequence(Box::new(a.as_ref().into()), Box::new(b.as_ref().into()))
            }
            PropertyPathExpression::Alternative(a, b) => {
                Self::Alternative(Box::new(a.as_ref().into()), Box::new(b.as_ref().into()))
            }
            PropertyPathExpression::ZeroOrMore(p) => Self::zero_or_more(Self::from(p.as_ref())),
            PropertyPathExpression::OneOrMore(p) => Self::one_or_more(Self::from(p.as_ref())),
            PropertyPathExpression::ZeroOrOne(p) => Self::ZeroOrOne(Box::new(p.as_ref().into())),
            PropertyPathExpression::NegatedPropertySet(ps) => Self::NegatedPropertySet(ps.clone()),
        }
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(p) => p.fmt(f),
            Self::Inverse(p) => write!(f, "^({p})"),
            Self::Sequence(a, b) => write!(f, "({a} / {b})"),
            Self::Alternative(a, b) => write!(f, "({a} | {b})"),
            Self::ZeroOrOne(p) => write!(f, "({p})?"),
            Self::Repeat {
                path,
                min,
                max: Some(max),
            } => write!(f, "({path}){{{min},{max}}}"),
            Self::Repeat {
                path,
                min,
                max: None,
            } => write!(f, "({path}){{{min},}}"),
            Self::NegatedPropertySet(ps) => {
                f.write_str("!(")?;
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    p.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A pair of nodes connected by a path.
#[derive(Clone, Debug)]
pub struct PathResult {
    pub start: Term,
    pub end: Term,
    /// Nodes traversed before reaching `end` by the repetition that produced this result.
    ///
    /// Never contains `end`. Empty for results not produced by a repetition.
    pub visited: Rc<FxHashSet<Term>>,
}

impl PathResult {
    fn new(start: Term, end: Term) -> Self {
        Self {
            start,
            end,
            visited: Rc::default(),
        }
    }

    fn swapped(self) -> Self {
        let mut visited = self.visited;
        if visited.contains(&self.start) {
            Rc::make_mut(&mut visited).remove(&self.start);
        }
        Self {
            start: self.end,
            end: self.start,
            visited,
        }
    }
}

pub type PathIter<'a> = Box<dyn Iterator<Item = Result<PathResult, QueryEvaluationError>> + 'a>;

/// Evaluates property paths against the active graph of a context.
#[derive(Clone)]
pub struct PathEvaluator<'a> {
    context: EvaluationContext<'a>,
}

impl<'a> PathEvaluator<'a> {
    pub fn new(context: EvaluationContext<'a>) -> Self {
        Self { context }
    }

    /// All the `(start, end)` pairs connected by `path`, `None` meaning any node.
    ///
    /// The context is checked for cancellation and timeout on every produced result.
    pub fn evaluate(
        &self,
        path: &PathExpression,
        start: Option<&Term>,
        end: Option<&Term>,
    ) -> PathIter<'a> {
        let results = match (start, end) {
            (Some(start), Some(end)) => {
                let end = end.clone();
                Box::new(
                    self.eval_from(path, start)
                        .filter(move |r| r.as_ref().is_ok_and(|r| r.end == end) || r.is_err()),
                )
            }
            (Some(start), None) => self.eval_from(path, start),
            (None, Some(end)) => Box::new(
                self.eval_from(&path.inverse(), end)
                    .map(|r| r.map(PathResult::swapped)),
            ),
            (None, None) => self.eval_open(path),
        };
        let context = self.context.clone();
        Box::new(results.map(move |r| {
            context.check()?;
            r
        }))
    }

    /// Results starting from a given node.
    fn eval_from(&self, path: &PathExpression, start: &Term) -> PathIter<'a> {
        match path {
            PathExpression::Predicate(p) => {
                let start = start.clone();
                let p = Term::from(p.clone());
                Box::new(
                    self.context
                        .dataset()
                        .triples_for_pattern(Some(&start), Some(&p), None, self.context.active_graph())
                        .map(move |t| Ok(PathResult::new(start.clone(), t?.object))),
                )
            }
            PathExpression::NegatedPropertySet(ps) => {
                let start = start.clone();
                let ps = ps.clone();
                Box::new(
                    self.context
                        .dataset()
                        .triples_for_pattern(Some(&start), None, None, self.context.active_graph())
                        .filter_map(move |t| match t {
                            Ok(t) => (!ps.contains(&t.predicate))
                                .then(|| Ok(PathResult::new(start.clone(), t.object))),
                            Err(e) => Some(Err(e)),
                        }),
                )
            }
            PathExpression::Inverse(inner) => match inner.as_ref() {
                PathExpression::Predicate(p) => {
                    let start = start.clone();
                    let p = Term::from(p.clone());
                    Box::new(
                        self.context
                            .dataset()
                            .triples_for_pattern(None, Some(&p), Some(&start), self.context.active_graph())
                            .map(move |t| Ok(PathResult::new(start.clone(), t?.subject.into()))),
                    )
                }
                PathExpression::NegatedPropertySet(ps) => {
                    let start = start.clone();
                    let ps = ps.clone();
                    Box::new(
                        self.context
                            .dataset()
                            .triples_for_pattern(None, None, Some(&start), self.context.active_graph())
                            .filter_map(move |t| match t {
                                Ok(t) => (!ps.contains(&t.predicate))
                                    .then(|| Ok(PathResult::new(start.clone(), t.subject.into()))),
                                Err(e) => Some(Err(e)),
                            }),
                    )
                }
                inner => self.eval_from(&inner.inverse(), start),
            },
            PathExpression::Sequence(a, b) => {
                let eval = self.clone();
                let b = (**b).clone();
                Box::new(self.eval_from(a, start).flat_map_ok(move |middle| {
                    let start = middle.start;
                    eval.eval_from(&b, &middle.end)
                        .map(move |r| Ok(PathResult::new(start.clone(), r?.end)))
                }))
            }
            PathExpression::Alternative(a, b) => {
                Box::new(self.eval_from(a, start).chain(self.eval_from(b, start)))
            }
            PathExpression::ZeroOrOne(inner) => Box::new(hash_deduplicate(
                once(Ok(PathResult::new(start.clone(), start.clone())))
                    .chain(self.eval_from(inner, start)),
            )),
            PathExpression::Repeat { path, min, max } => {
                let limit = self.context.limits().max_property_path_depth;
                let prune = max.is_none() && *min <= 1;
                debug!(%path, min, ?max, ?limit, prune, "repetition from {start}");
                Box::new(RepeatIterator::new(
                    self.clone(),
                    (**path).clone(),
                    start.clone(),
                    *min,
                    *max,
                    limit,
                    prune,
                ))
            }
        }
    }

    /// Results with both ends free.
    fn eval_open(&self, path: &PathExpression) -> PathIter<'a> {
        let graph = self.context.active_graph();
        match path {
            PathExpression::Predicate(p) => Box::new(
                self.context
                    .dataset()
                    .triples_for_pattern(None, Some(&p.clone().into()), None, graph)
                    .map(|t| {
                        let t = t?;
                        Ok(PathResult::new(t.subject.into(), t.object))
                    }),
            ),
            PathExpression::NegatedPropertySet(ps) => {
                let ps = ps.clone();
                Box::new(
                    self.context
                        .dataset()
                        .triples_for_pattern(None, None, None, graph)
                        .filter_map(move |t| match t {
                            Ok(t) => (!ps.contains(&t.predicate))
                                .then(|| Ok(PathResult::new(t.subject.into(), t.object))),
                            Err(e) => Some(Err(e)),
                        }),
                )
            }
            PathExpression::Inverse(inner) => {
                Box::new(self.eval_open(inner).map(|r| r.map(PathResult::swapped)))
            }
            PathExpression::Sequence(a, b) => {
                let eval = self.clone();
                let b = (**b).clone();
                Box::new(self.eval_open(a).flat_map_ok(move |middle| {
                    let start = middle.start;
                    eval.eval_from(&b, &middle.end)
                        .map(move |r| Ok(PathResult::new(start.clone(), r?.end)))
                }))
            }
            PathExpression::Alternative(a, b) => Box::new(self.eval_open(a).chain(self.eval_open(b))),
            PathExpression::ZeroOrOne(inner) => Box::new(hash_deduplicate(
                self.zero_length_results().chain(self.eval_open(inner)),
            )),
            PathExpression::Repeat { min, path: inner, .. } => {
                // Every node may start a zero-length path, otherwise only the starts of a first step
                let starts: PathIter<'a> = if *min == 0 {
                    self.zero_length_results()
                } else {
                    self.eval_open(inner)
                };
                let eval = self.clone();
                let path = path.clone();
                let mut seen = FxHashSet::default();
                Box::new(
                    starts
                        .filter(move |r| match r {
                            Ok(r) => seen.insert(r.start.clone()),
                            Err(_) => true,
                        })
                        .flat_map_ok(move |r| eval.eval_from(&path, &r.start)),
                )
            }
        }
    }

    /// `(n, n)` for every node `n` of the active graph.
    fn zero_length_results(&self) -> PathIter<'a> {
        match self.context.dataset().nodes(self.context.active_graph()) {
            Ok(nodes) => Box::new(
                nodes
                    .into_iter()
                    .map(|n| Ok(PathResult::new(n.clone(), n))),
            ),
            Err(e) => Box::new(once(Err(e))),
        }
    }
}

struct Frame {
    node: Term,
    step: usize,
    /// Nodes of the path leading to `node`, `node` included
    visited: Rc<FxHashSet<Term>>,
}

/// Breadth-first enumeration of the repetitions of a path from a fixed start node.
///
/// A node is never re-entered on the same path, which bounds the traversal on cyclic graphs.
/// When `max` is unbounded and `min <= 1` a node already expanded from this start is not expanded again,
/// the step of each expanded node being then its distance from the start.
struct RepeatIterator<'a> {
    evaluator: PathEvaluator<'a>,
    path: PathExpression,
    start: Term,
    min: usize,
    max: Option<usize>,
    limit: Option<usize>,
    frontier: VecDeque<Frame>,
    current: Option<(Frame, PathIter<'a>)>,
    pending: Option<PathResult>,
    emitted: FxHashSet<Term>,
    expanded: Option<FxHashSet<Term>>,
}

impl<'a> RepeatIterator<'a> {
    fn new(
        evaluator: PathEvaluator<'a>,
        path: PathExpression,
        start: Term,
        min: usize,
        max: Option<usize>,
        limit: Option<usize>,
        prune: bool,
    ) -> Self {
        let mut visited = FxHashSet::default();
        let mut emitted = FxHashSet::default();
        let mut pending = None;
        if min == 0 {
            visited.insert(start.clone());
            emitted.insert(start.clone());
            pending = Some(PathResult::new(start.clone(), start.clone()));
        }
        let expanded = prune.then(|| FxHashSet::from_iter([start.clone()]));
        let frontier = if max == Some(0) {
            VecDeque::new()
        } else {
            VecDeque::from([Frame {
                node: start.clone(),
                step: 0,
                visited: Rc::new(visited),
            }])
        };
        Self {
            evaluator,
            path,
            start,
            min,
            max,
            limit,
            frontier,
            current: None,
            pending,
            emitted,
            expanded,
        }
    }
}

impl Iterator for RepeatIterator<'_> {
    type Item = Result<PathResult, QueryEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(result) = self.pending.take() {
            return Some(Ok(result));
        }
        loop {
            if let Some((frame, successors)) = &mut self.current {
                match successors.next() {
                    Some(Ok(successor)) => {
                        let end = successor.end;
                        if frame.visited.contains(&end) {
                            continue;
                        }
                        if self.emitted.contains(&end)
                            && self
                                .expanded
                                .as_ref()
                                .is_some_and(|expanded| expanded.contains(&end))
                        {
                            continue;
                        }
                        let step = frame.step + 1;
                        if let Some(limit) = self.limit {
                            if step > limit {
                                self.frontier.clear();
                                self.current = None;
                                return Some(Err(QueryEvaluationError::PropertyPathTooLong {
                                    limit,
                                }));
                            }
                        }
                        let result = (step >= self.min && self.emitted.insert(end.clone())).then(
                            || PathResult {
                                start: self.start.clone(),
                                end: end.clone(),
                                visited: Rc::clone(&frame.visited),
                            },
                        );
                        let expand = self.max.is_none_or(|max| step < max)
                            && self
                                .expanded
                                .as_mut()
                                .is_none_or(|expanded| expanded.insert(end.clone()));
                        if expand {
                            let mut visited = (*frame.visited).clone();
                            visited.insert(end.clone());
                            self.frontier.push_back(Frame {
                                node: end,
                                step,
                                visited: Rc::new(visited),
                            });
                        }
                        if let Some(result) = result {
                            return Some(Ok(result));
                        }
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => self.current = None,
                }
            } else {
                let frame = self.frontier.pop_front()?;
                if let Err(e) = self.evaluator.context.check() {
                    self.frontier.clear();
                    return Some(Err(e));
                }
                let successors = self.evaluator.eval_from(&self.path, &frame.node);
                self.current = Some((frame, successors));
            }
        }
    }
}

fn hash_deduplicate<'a>(
    iter: impl Iterator<Item = Result<PathResult, QueryEvaluationError>> + 'a,
) -> impl Iterator<Item = Result<PathResult, QueryEvaluationError>> + 'a {
    let mut already_seen = FxHashSet::default();
    iter.filter(move |r| {
        if let Ok(r) = r {
            already_seen.insert((r.start.clone(), r.end.clone()))
        } else {
            true
        }
    })
}

trait ResultIterator<T, E>: Iterator<Item = Result<T, E>> + Sized {
    fn flat_map_ok<O, F: FnMut(T) -> U, U: IntoIterator<Item = Result<O, E>>>(
        self,
        f: F,
    ) -> FlatMapOk<T, E, O, Self, F, U>;
}

impl<T, E, I: Iterator<Item = Result<T, E>> + Sized> ResultIterator<T, E> for I {
    #[inline]
    fn flat_map_ok<O, F: FnMut(T) -> U, U: IntoIterator<Item = Result<O, E>>>(
        self,
        f: F,
    ) -> FlatMapOk<T, E, O, Self, F, U> {
        FlatMapOk {
            inner: self,
            f,
            current: None,
        }
    }
}

struct FlatMapOk<
    T,
    E,
    O,
    I: Iterator<Item = Result<T, E>>,
    F: FnMut(T) -> U,
    U: IntoIterator<Item = Result<O, E>>,
> {
    inner: I,
    f: F,
    current: Option<U::IntoIter>,
}

impl<
    T,
    E,
    O,
    I: Iterator<Item = Result<T, E>>,
    F: FnMut(T) -> U,
    U: IntoIterator<Item = Result<O, E>>,
> Iterator for FlatMapOk<T, E, O, I, F, U>
{
    type Item = Result<O, E>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = &mut self.current {
                if let Some(next) = current.next() {
                    return Some(next);
                }
            }
            self.current = None;
            match self.inner.next()? {
                Ok(e) => self.current = Some((self.f)(e).into_iter()),
                Err(error) => return Some(Err(error)),
            }
        }
    }
}
