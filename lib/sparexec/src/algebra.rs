//! The algebra nodes the evaluator understands.

use crate::aggregate::AggregateExpression;
use crate::binding::Binding;
use crate::expression::Expression;
use crate::join::JoinStrategy;
use crate::path::PathExpression;
use oxrdf::{BlankNode, Literal, NamedNode, Term, Variable};
use std::collections::BTreeSet;
use std::fmt;

/// A term or a variable in a pattern.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum TermPattern {
    Term(Term),
    Variable(Variable),
}

impl TermPattern {
    /// The value of the pattern in `binding`, `None` if it is an unbound variable.
    pub fn resolve(&self, binding: &Binding) -> Option<Term> {
        match self {
            Self::Term(term) => Some(term.clone()),
            Self::Variable(variable) => binding.get(variable).cloned(),
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Term(_) => None,
            Self::Variable(variable) => Some(variable),
        }
    }
}

impl From<Term> for TermPattern {
    #[inline]
    fn from(term: Term) -> Self {
        Self::Term(term)
    }
}

impl From<NamedNode> for TermPattern {
    #[inline]
    fn from(node: NamedNode) -> Self {
        Self::Term(node.into())
    }
}

impl From<BlankNode> for TermPattern {
    #[inline]
    fn from(node: BlankNode) -> Self {
        Self::Term(node.into())
    }
}

impl From<Literal> for TermPattern {
    #[inline]
    fn from(literal: Literal) -> Self {
        Self::Term(literal.into())
    }
}

impl From<Variable> for TermPattern {
    #[inline]
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => term.fmt(f),
            Self::Variable(variable) => variable.fmt(f),
        }
    }
}

/// A graph pattern, the unit of evaluation.
///
/// Join-like nodes may force a [`JoinStrategy`], otherwise one is picked from the data.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum GraphPattern {
    /// Inline data. `None` cells are unbound.
    Values {
        variables: Vec<Variable>,
        bindings: Vec<Vec<Option<Term>>>,
    },
    /// A property path between two nodes of the active graph.
    Path {
        subject: TermPattern,
        path: PathExpression,
        object: TermPattern,
    },
    Join {
        left: Box<Self>,
        right: Box<Self>,
        strategy: Option<JoinStrategy>,
    },
    /// `OPTIONAL` with an optional filter on the merged bindings.
    LeftJoin {
        left: Box<Self>,
        right: Box<Self>,
        expression: Option<Expression>,
        strategy: Option<JoinStrategy>,
    },
    Minus {
        left: Box<Self>,
        right: Box<Self>,
        strategy: Option<JoinStrategy>,
    },
    Union {
        left: Box<Self>,
        right: Box<Self>,
    },
    Filter {
        expression: Expression,
        inner: Box<Self>,
    },
    /// Evaluates `inner` against a named graph, or against every named graph if `name` is a variable.
    Graph {
        name: TermPattern,
        inner: Box<Self>,
    },
    /// Groups by `variables` and binds each aggregate result to its variable.
    Group {
        inner: Box<Self>,
        variables: Vec<Variable>,
        aggregates: Vec<(Variable, AggregateExpression)>,
    },
}

impl GraphPattern {
    pub fn path(
        subject: impl Into<TermPattern>,
        path: impl Into<PathExpression>,
        object: impl Into<TermPattern>,
    ) -> Self {
        Self::Path {
            subject: subject.into(),
            path: path.into(),
            object: object.into(),
        }
    }

    pub fn join(left: Self, right: Self) -> Self {
        Self::Join {
            left: Box::new(left),
            right: Box::new(right),
            strategy: None,
        }
    }

    pub fn left_join(left: Self, right: Self, expression: Option<Expression>) -> Self {
        Self::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            expression,
            strategy: None,
        }
    }

    pub fn minus(left: Self, right: Self) -> Self {
        Self::Minus {
            left: Box::new(left),
            right: Box::new(right),
            strategy: None,
        }
    }

    pub fn union(left: Self, right: Self) -> Self {
        Self::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// The variables that may be bound by the pattern solutions.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut variables = BTreeSet::new();
        self.on_in_scope_variable(&mut |v| {
            variables.insert(v.clone());
        });
        variables
    }

    fn on_in_scope_variable<'a>(&'a self, callback: &mut impl FnMut(&'a Variable)) {
        match self {
            Self::Values { variables, .. } => variables.iter().for_each(callback),
            Self::Path {
                subject, object, ..
            } => {
                if let Some(v) = subject.as_variable() {
                    callback(v);
                }
                if let Some(v) = object.as_variable() {
                    callback(v);
                }
            }
            Self::Join { left, right, .. }
            | Self::LeftJoin { left, right, .. }
            | Self::Union { left, right } => {
                left.on_in_scope_variable(callback);
                right.on_in_scope_variable(callback);
            }
            Self::Minus { left, .. } => left.on_in_scope_variable(callback),
            Self::Filter { inner, .. } => inner.on_in_scope_variable(callback),
            Self::Graph { name, inner } => {
                if let Some(v) = name.as_variable() {
                    callback(v);
                }
                inner.on_in_scope_variable(callback);
            }
            Self::Group {
                variables,
                aggregates,
                ..
            } => {
                variables.iter().for_each(&mut *callback);
                for (v, _) in aggregates {
                    callback(v);
                }
            }
        }
    }

    /// Name of the node kind, for logs.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Values { .. } => "values",
            Self::Path { .. } => "path",
            Self::Join { .. } => "join",
            Self::LeftJoin { .. } => "left_join",
            Self::Minus { .. } => "minus",
            Self::Union { .. } => "union",
            Self::Filter { .. } => "filter",
            Self::Graph { .. } => "graph",
            Self::Group { .. } => "group",
        }
    }
}
