use crate::algebra::TermPattern;
use crate::binding::Binding;
use crate::error::QueryEvaluationError;
use oxrdf::{Dataset, GraphName, GraphNameRef, QuadRef, Term, TermRef, Triple};
use rustc_hash::FxHashSet;
use std::iter::empty;

/// Iterator over the triples matching a pattern.
pub type TripleIter<'a> = Box<dyn Iterator<Item = Result<Triple, QueryEvaluationError>> + 'a>;

/// A [RDF dataset](https://www.w3.org/TR/sparql11-query/#rdfDataset) the evaluator can match patterns against.
///
/// This is the only way the evaluator touches storage.
pub trait QueryableDataset {
    /// Fetches the triples of `graph_name` matching a pattern, `None` meaning "any value".
    fn triples_for_pattern<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph_name: GraphNameRef<'_>,
    ) -> TripleIter<'a>;

    /// Fetches the list of the dataset named graphs.
    fn named_graphs(&self) -> Box<dyn Iterator<Item = Result<GraphName, QueryEvaluationError>> + '_>;

    /// Fetches the triples matching a pattern whose variables are resolved against `binding`.
    ///
    /// A variable that is bound in `binding` behaves as a constant, any other variable matches anything.
    /// A variable occurring several times in the pattern must match the same term each time.
    fn match_pattern<'a>(
        &'a self,
        subject: &TermPattern,
        predicate: &TermPattern,
        object: &TermPattern,
        graph_name: GraphNameRef<'_>,
        binding: &Binding,
    ) -> TripleIter<'a> {
        let s = subject.resolve(binding);
        let p = predicate.resolve(binding);
        let o = object.resolve(binding);
        let repeated = [
            (subject, predicate, 0, 1),
            (subject, object, 0, 2),
            (predicate, object, 1, 2),
        ]
        .into_iter()
        .filter_map(|(a, b, i, j)| match (a, b) {
            (TermPattern::Variable(a), TermPattern::Variable(b)) if a == b => Some((i, j)),
            _ => None,
        })
        .collect::<Vec<_>>();
        let triples =
            self.triples_for_pattern(s.as_ref(), p.as_ref(), o.as_ref(), graph_name);
        if repeated.is_empty() {
            return triples;
        }
        Box::new(triples.filter(move |t| {
            let Ok(t) = t else {
                return true;
            };
            let terms = [
                Term::from(t.subject.clone()),
                Term::from(t.predicate.clone()),
                t.object.clone(),
            ];
            repeated.iter().all(|(i, j)| terms[*i] == terms[*j])
        }))
    }

    /// All the subjects and objects of the given graph, each returned once.
    fn nodes(&self, graph_name: GraphNameRef<'_>) -> Result<Vec<Term>, QueryEvaluationError> {
        let mut seen = FxHashSet::default();
        let mut nodes = Vec::new();
        for triple in self.triples_for_pattern(None, None, None, graph_name) {
            let triple = triple?;
            for node in [Term::from(triple.subject), triple.object] {
                if seen.insert(node.clone()) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }
}

impl QueryableDataset for Dataset {
    fn triples_for_pattern<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph_name: GraphNameRef<'_>,
    ) -> TripleIter<'a> {
        fn quad_to_result(quad: QuadRef<'_>) -> Result<Triple, QueryEvaluationError> {
            Ok(Triple::new(
                quad.subject.into_owned(),
                quad.predicate.into_owned(),
                quad.object.into_owned(),
            ))
        }

        // The index iterators borrow the pattern terms, so matches are collected eagerly
        let filter = |q: &QuadRef<'_>| {
            predicate.is_none_or(|t| TermRef::from(t) == q.predicate.into())
                && object.is_none_or(|t| TermRef::from(t) == q.object)
                && subject.is_none_or(|t| TermRef::from(t) == q.subject.into())
                && graph_name == q.graph_name
        };
        let quads = if let Some(subject) = subject {
            match subject {
                Term::NamedNode(s) => self
                    .quads_for_subject(s.as_ref())
                    .filter(filter)
                    .map(quad_to_result)
                    .collect::<Vec<_>>(),
                Term::BlankNode(s) => self
                    .quads_for_subject(s.as_ref())
                    .filter(filter)
                    .map(quad_to_result)
                    .collect(),
                _ => Vec::new(),
            }
        } else if let Some(object) = object {
            self.quads_for_object(object.as_ref())
                .filter(filter)
                .map(quad_to_result)
                .collect()
        } else if let Some(predicate) = predicate {
            let Term::NamedNode(predicate) = predicate else {
                return Box::new(empty());
            };
            self.quads_for_predicate(predicate.as_ref())
                .filter(filter)
                .map(quad_to_result)
                .collect()
        } else {
            self.quads_for_graph_name(graph_name)
                .map(quad_to_result)
                .collect()
        };
        Box::new(quads.into_iter())
    }

    fn named_graphs(&self) -> Box<dyn Iterator<Item = Result<GraphName, QueryEvaluationError>> + '_> {
        let mut seen = FxHashSet::default();
        Box::new(
            self.iter()
                .filter(|q| !q.graph_name.is_default_graph())
                .filter_map(move |q| {
                    let graph_name = q.graph_name.into_owned();
                    seen.insert(graph_name.clone()).then_some(Ok(graph_name))
                }),
        )
    }
}

impl<D: QueryableDataset + ?Sized> QueryableDataset for &D {
    fn triples_for_pattern<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph_name: GraphNameRef<'_>,
    ) -> TripleIter<'a> {
        (**self).triples_for_pattern(subject, predicate, object, graph_name)
    }

    fn named_graphs(&self) -> Box<dyn Iterator<Item = Result<GraphName, QueryEvaluationError>> + '_> {
        (**self).named_graphs()
    }
}
