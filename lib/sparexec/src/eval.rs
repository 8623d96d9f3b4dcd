use crate::aggregate::{AggregateExpression, group};
use crate::algebra::{GraphPattern, TermPattern};
use crate::binding::{Binding, SolutionIter};
use crate::context::EvaluationContext;
use crate::error::QueryEvaluationError;
use crate::join::{BindingSource, JoinEnumerable};
use crate::multiset::Multiset;
use crate::path::{PathEvaluator, PathExpression};
use oxrdf::{GraphName, Term, Variable};
use std::iter::{empty, once};
use std::rc::Rc;
use tracing::trace;

/// Evaluates a pattern to a materialised multiset.
///
/// The right side of a join is not evaluated if the left side is empty.
pub(crate) fn evaluate(
    context: &EvaluationContext<'_>,
    pattern: &GraphPattern,
) -> Result<Multiset, QueryEvaluationError> {
    trace!(kind = pattern.kind(), graph = %context.active_graph(), "evaluating");
    context.check()?;
    Ok(match pattern {
        GraphPattern::Values {
            variables,
            bindings,
        } => {
            if variables.is_empty() && bindings.len() == 1 {
                Multiset::Identity
            } else {
                Multiset::with_variables(
                    variables.iter().cloned(),
                    bindings.iter().map(|row| values_row(variables, row)),
                )
            }
        }
        GraphPattern::Path {
            subject,
            path,
            object,
        } => Multiset::with_variables(
            subject
                .as_variable()
                .into_iter()
                .chain(object.as_variable())
                .cloned(),
            path_bindings(context, path, subject, object, &Binding::default())
                .collect::<Result<Vec<_>, _>>()?,
        ),
        GraphPattern::Join {
            left,
            right,
            strategy,
        } => {
            let left = evaluate(context, left)?;
            if left.is_empty() {
                return Ok(Multiset::Null);
            }
            left.join_with(&evaluate(context, right)?, strategy.clone(), context)?
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
            strategy,
        } => {
            let left = evaluate(context, left)?;
            if left.is_empty() {
                return Ok(Multiset::Null);
            }
            left.left_join_unbinding(
                &evaluate(context, right)?,
                &right.variables().into_iter().collect::<Vec<_>>(),
                expression.as_ref(),
                strategy.clone(),
                context,
            )?
        }
        GraphPattern::Minus {
            left,
            right,
            strategy,
        } => {
            let left = evaluate(context, left)?;
            if left.is_empty() {
                return Ok(Multiset::Null);
            }
            left.minus_with(&evaluate(context, right)?, strategy.clone(), context)?
        }
        GraphPattern::Union { left, right } => {
            evaluate(context, left)?.union(&evaluate(context, right)?)
        }
        GraphPattern::Filter { expression, inner } => {
            evaluate(context, inner)?.filter(expression, context)?
        }
        GraphPattern::Graph { name, inner } => match name {
            TermPattern::Term(term) => {
                let Some(graph_name) = to_graph_name(term) else {
                    return Ok(Multiset::Null);
                };
                evaluate(&context.with_active_graph(graph_name), inner)?
            }
            TermPattern::Variable(variable) => {
                let mut output = Multiset::Null;
                for graph_name in context.dataset().named_graphs() {
                    let graph_name = graph_name?;
                    let Some(term) = to_term(&graph_name) else {
                        return Err(QueryEvaluationError::UnexpectedDefaultGraph);
                    };
                    let solutions = evaluate(&context.with_active_graph(graph_name), inner)?;
                    let mut variables = solutions.variables().cloned().collect::<Vec<_>>();
                    variables.push(variable.clone());
                    output = output.union(&Multiset::with_variables(
                        variables,
                        solutions
                            .iter()
                            .filter_map(|b| bind_graph_name(b, variable, &term)),
                    ));
                }
                output
            }
        },
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => {
            let input = evaluate(context, inner)?;
            Multiset::with_variables(
                variables
                    .iter()
                    .chain(aggregates.iter().map(|(v, _)| v))
                    .cloned(),
                group(input.iter().map(Ok), variables, aggregates, context)?,
            )
        }
    })
}

/// Evaluates a pattern lazily.
pub(crate) fn evaluate_iter<'a>(
    context: &EvaluationContext<'a>,
    pattern: &GraphPattern,
) -> SolutionIter<'a> {
    build(pattern)(context)
}

/// Compiles a pattern into a restartable source of bindings.
fn build<'a>(pattern: &GraphPattern) -> BindingSource<'a> {
    let kind = pattern.kind();
    let source = build_node(pattern);
    Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
        trace!(kind, graph = %context.active_graph(), "evaluating lazily");
        source(context)
    })
}

fn build_node<'a>(pattern: &GraphPattern) -> BindingSource<'a> {
    match pattern {
        GraphPattern::Values {
            variables,
            bindings,
        } => {
            let bindings = bindings
                .iter()
                .map(|row| values_row(variables, row))
                .collect::<Rc<[_]>>();
            Rc::new(move |_: &EvaluationContext<'a>| -> SolutionIter<'a> {
                let bindings = Rc::clone(&bindings);
                Box::new((0..bindings.len()).map(move |i| Ok(bindings[i].clone())))
            })
        }
        GraphPattern::Path {
            subject,
            path,
            object,
        } => {
            let subject = subject.clone();
            let path = path.clone();
            let object = object.clone();
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                path_bindings(context, &path, &subject, &object, &Binding::default())
            })
        }
        GraphPattern::Join {
            left,
            right,
            strategy,
        } => {
            let mut join =
                JoinEnumerable::new(build(left), build(right), join_variables(left, right));
            if let Some(strategy) = strategy {
                join = join.with_strategy(strategy.clone());
            }
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                join.iter(context)
            })
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
            strategy,
        } => {
            let mut join =
                JoinEnumerable::new(build(left), build(right), join_variables(left, right))
                    .left_outer(
                        expression.clone(),
                        right.variables().into_iter().collect::<Vec<_>>(),
                    );
            if let Some(strategy) = strategy {
                join = join.with_strategy(strategy.clone());
            }
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                join.iter(context)
            })
        }
        GraphPattern::Minus {
            left,
            right,
            strategy,
        } => {
            let mut join =
                JoinEnumerable::new(build(left), build(right), join_variables(left, right))
                    .minus();
            if let Some(strategy) = strategy {
                join = join.with_strategy(strategy.clone().non_existence());
            }
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                join.iter(context)
            })
        }
        GraphPattern::Union { left, right } => {
            let left = build(left);
            let right = build(right);
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                Box::new(left(context).chain(right(context)))
            })
        }
        GraphPattern::Filter { expression, inner } => {
            let inner = build(inner);
            let expression = Rc::new(expression.clone());
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                let expression = Rc::clone(&expression);
                let filter_context = context.clone();
                Box::new(inner(context).filter(move |binding| match binding {
                    Ok(binding) => filter_context
                        .expression_evaluator()
                        .evaluate_effective_boolean_value(&expression, binding, &filter_context)
                        .unwrap_or(false),
                    Err(_) => true,
                }))
            })
        }
        GraphPattern::Graph { name, inner } => {
            let inner = build(inner);
            match name {
                TermPattern::Term(term) => {
                    let graph_name = to_graph_name(term);
                    Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                        match &graph_name {
                            Some(graph_name) => inner(&context.with_active_graph(graph_name.clone())),
                            None => Box::new(empty()),
                        }
                    })
                }
                TermPattern::Variable(variable) => {
                    let variable = variable.clone();
                    Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                        let inner = Rc::clone(&inner);
                        let variable = variable.clone();
                        let context = context.clone();
                        Box::new(context.dataset().named_graphs().flat_map(
                            move |graph_name| -> SolutionIter<'a> {
                                let graph_name = match graph_name {
                                    Ok(graph_name) => graph_name,
                                    Err(e) => return Box::new(once(Err(e))),
                                };
                                let Some(term) = to_term(&graph_name) else {
                                    return Box::new(once(Err(
                                        QueryEvaluationError::UnexpectedDefaultGraph,
                                    )));
                                };
                                let variable = variable.clone();
                                Box::new(
                                    inner(&context.with_active_graph(graph_name)).filter_map(
                                        move |binding| match binding {
                                            Ok(binding) => {
                                                bind_graph_name(binding, &variable, &term).map(Ok)
                                            }
                                            Err(e) => Some(Err(e)),
                                        },
                                    ),
                                )
                            },
                        ))
                    })
                }
            }
        }
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => {
            let inner = build(inner);
            let variables = Rc::<[Variable]>::from(variables.as_slice());
            let aggregates = Rc::<[(Variable, AggregateExpression)]>::from(aggregates.as_slice());
            Rc::new(move |context: &EvaluationContext<'a>| -> SolutionIter<'a> {
                match group(inner(context), &variables, &aggregates, context) {
                    Ok(bindings) => Box::new(bindings.into_iter().map(Ok)),
                    Err(e) => Box::new(once(Err(e))),
                }
            })
        }
    }
}

fn join_variables(left: &GraphPattern, right: &GraphPattern) -> Vec<Variable> {
    left.variables()
        .intersection(&right.variables())
        .cloned()
        .collect()
}

fn values_row(variables: &[Variable], row: &[Option<Term>]) -> Binding {
    variables
        .iter()
        .zip(row)
        .map(|(variable, value)| (variable.clone(), value.clone()))
        .collect()
}

fn to_graph_name(term: &Term) -> Option<GraphName> {
    match term {
        Term::NamedNode(node) => Some(node.clone().into()),
        Term::BlankNode(node) => Some(node.clone().into()),
        _ => None,
    }
}

fn to_term(graph_name: &GraphName) -> Option<Term> {
    match graph_name {
        GraphName::NamedNode(node) => Some(node.clone().into()),
        GraphName::BlankNode(node) => Some(node.clone().into()),
        GraphName::DefaultGraph => None,
    }
}

fn bind_graph_name(binding: Binding, variable: &Variable, graph_name: &Term) -> Option<Binding> {
    match binding.get(variable) {
        Some(value) if value != graph_name => None,
        Some(_) => Some(binding),
        None => Some(binding.with(variable.clone(), graph_name.clone())),
    }
}

/// The bindings of the variables of `subject` and `object` for each pair connected by `path`.
///
/// Variables already bound in `binding` act as constants.
pub(crate) fn path_bindings<'a>(
    context: &EvaluationContext<'a>,
    path: &PathExpression,
    subject: &TermPattern,
    object: &TermPattern,
    binding: &Binding,
) -> SolutionIter<'a> {
    let start = subject.resolve(binding);
    let end = object.resolve(binding);
    let subject_variable = subject.as_variable().filter(|_| start.is_none()).cloned();
    let object_variable = object.as_variable().filter(|_| end.is_none()).cloned();
    let binding = binding.clone();
    Box::new(
        PathEvaluator::new(context.clone())
            .evaluate(path, start.as_ref(), end.as_ref())
            .filter_map(move |result| {
                let result = match result {
                    Ok(result) => result,
                    Err(e) => return Some(Err(e)),
                };
                let mut output = binding.clone();
                if let Some(variable) = &subject_variable {
                    output = output.with(variable.clone(), result.start.clone());
                }
                if let Some(variable) = &object_variable {
                    if subject_variable.as_ref() == Some(variable) {
                        if result.start != result.end {
                            return None;
                        }
                    } else {
                        output = output.with(variable.clone(), result.end);
                    }
                }
                Some(Ok(output))
            }),
    )
}
