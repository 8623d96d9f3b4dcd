use crate::binding::Binding;
use crate::context::EvaluationContext;
use crate::error::ExpressionError;
use crate::numeric::{NumericValue, compare_terms};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Literal, NamedNode, Term, Variable};
use oxsdatatypes::Boolean;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An expression evaluated against a single binding.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Expression {
    Variable(Variable),
    Constant(Term),
    /// [BOUND](https://www.w3.org/TR/sparql11-query/#func-bound)
    Bound(Variable),
    /// [sameTerm](https://www.w3.org/TR/sparql11-query/#func-sameTerm)
    SameTerm(Box<Self>, Box<Self>),
    /// [RDFterm-equal](https://www.w3.org/TR/sparql11-query/#func-RDFterm-equal) and all the XSD equalities
    Equal(Box<Self>, Box<Self>),
    Less(Box<Self>, Box<Self>),
    Greater(Box<Self>, Box<Self>),
    /// Numeric addition following the promotion lattice
    Add(Box<Self>, Box<Self>),
    /// [Logical-and](https://www.w3.org/TR/sparql11-query/#func-logical-and)
    And(Box<Self>, Box<Self>),
    /// [Logical-or](https://www.w3.org/TR/sparql11-query/#func-logical-or)
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
    /// A call to a function registered with [`QueryEvaluator::with_custom_function`](crate::QueryEvaluator::with_custom_function)
    FunctionCall(NamedNode, Vec<Self>),
}

impl From<Variable> for Expression {
    #[inline]
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl From<Term> for Expression {
    #[inline]
    fn from(term: Term) -> Self {
        Self::Constant(term)
    }
}

impl From<Literal> for Expression {
    #[inline]
    fn from(literal: Literal) -> Self {
        Self::Constant(literal.into())
    }
}

impl From<NamedNode> for Expression {
    #[inline]
    fn from(node: NamedNode) -> Self {
        Self::Constant(node.into())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(v) => v.fmt(f),
            Self::Constant(t) => t.fmt(f),
            Self::Bound(v) => write!(f, "BOUND({v})"),
            Self::SameTerm(a, b) => write!(f, "sameTerm({a}, {b})"),
            Self::Equal(a, b) => write!(f, "({a} = {b})"),
            Self::Less(a, b) => write!(f, "({a} < {b})"),
            Self::Greater(a, b) => write!(f, "({a} > {b})"),
            Self::Add(a, b) => write!(f, "({a} + {b})"),
            Self::And(a, b) => write!(f, "({a} && {b})"),
            Self::Or(a, b) => write!(f, "({a} || {b})"),
            Self::Not(e) => write!(f, "!{e}"),
            Self::FunctionCall(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Evaluates expressions for filters, aggregates and `GROUP_CONCAT` separators.
///
/// Errors are scoped to the binding being evaluated: the caller decides what an error means.
pub trait ExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &Expression,
        binding: &Binding,
        context: &EvaluationContext<'_>,
    ) -> Result<Term, ExpressionError>;

    /// The [effective boolean value](https://www.w3.org/TR/sparql11-query/#ebv) of the expression.
    fn evaluate_effective_boolean_value(
        &self,
        expression: &Expression,
        binding: &Binding,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, ExpressionError> {
        effective_boolean_value(&self.evaluate(expression, binding, context)?)
    }
}

/// The default [`ExpressionEvaluator`] implementing the [`Expression`] operators.
#[derive(Clone, Copy, Default, Debug)]
pub struct StandardExpressionEvaluator;

impl ExpressionEvaluator for StandardExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &Expression,
        binding: &Binding,
        context: &EvaluationContext<'_>,
    ) -> Result<Term, ExpressionError> {
        Ok(match expression {
            Expression::Variable(v) => binding
                .get(v)
                .cloned()
                .ok_or_else(|| ExpressionError::UnboundVariable(v.clone()))?,
            Expression::Constant(t) => t.clone(),
            Expression::Bound(v) => Literal::from(binding.is_bound(v)).into(),
            Expression::SameTerm(a, b) => Literal::from(
                self.evaluate(a, binding, context)? == self.evaluate(b, binding, context)?,
            )
            .into(),
            Expression::Equal(a, b) => Literal::from(equals(
                &self.evaluate(a, binding, context)?,
                &self.evaluate(b, binding, context)?,
            )?)
            .into(),
            Expression::Less(a, b) => Literal::from(
                order(
                    &self.evaluate(a, binding, context)?,
                    &self.evaluate(b, binding, context)?,
                )? == Ordering::Less,
            )
            .into(),
            Expression::Greater(a, b) => Literal::from(
                order(
                    &self.evaluate(a, binding, context)?,
                    &self.evaluate(b, binding, context)?,
                )? == Ordering::Greater,
            )
            .into(),
            Expression::Add(a, b) => {
                let a = numeric(&self.evaluate(a, binding, context)?)?;
                let b = numeric(&self.evaluate(b, binding, context)?)?;
                a.checked_add(b)
                    .ok_or_else(|| ExpressionError::type_error("numeric overflow"))?
                    .into()
            }
            Expression::And(a, b) => {
                // An error on one side is forgiven if the other side is false
                let a = self.evaluate_effective_boolean_value(a, binding, context);
                let b = self.evaluate_effective_boolean_value(b, binding, context);
                Literal::from(match (a, b) {
                    (Ok(false), _) | (_, Ok(false)) => false,
                    (Ok(true), Ok(true)) => true,
                    (Err(e), _) | (_, Err(e)) => return Err(e),
                })
                .into()
            }
            Expression::Or(a, b) => {
                let a = self.evaluate_effective_boolean_value(a, binding, context);
                let b = self.evaluate_effective_boolean_value(b, binding, context);
                Literal::from(match (a, b) {
                    (Ok(true), _) | (_, Ok(true)) => true,
                    (Ok(false), Ok(false)) => false,
                    (Err(e), _) | (_, Err(e)) => return Err(e),
                })
                .into()
            }
            Expression::Not(e) => {
                Literal::from(!self.evaluate_effective_boolean_value(e, binding, context)?).into()
            }
            Expression::FunctionCall(name, args) => {
                let function = context
                    .resolve_function(name)
                    .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, binding, context))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&args).ok_or_else(|| ExpressionError::FunctionFailed {
                    name: name.clone(),
                    message: format!("no value for {} arguments", args.len()),
                })?
            }
        })
    }
}

fn numeric(term: &Term) -> Result<NumericValue, ExpressionError> {
    NumericValue::from_term(term)
        .ok_or_else(|| ExpressionError::type_error(format!("{term} is not a numeric value")))
}

fn equals(a: &Term, b: &Term) -> Result<bool, ExpressionError> {
    if a == b {
        return Ok(true);
    }
    match compare_terms(a, b) {
        Some(ordering) => Ok(ordering == Ordering::Equal),
        // Two different literals we do not know how to compare
        None if matches!((a, b), (Term::Literal(_), Term::Literal(_))) => Err(
            ExpressionError::type_error(format!("{a} and {b} can not be compared")),
        ),
        None => Ok(false),
    }
}

fn order(a: &Term, b: &Term) -> Result<Ordering, ExpressionError> {
    compare_terms(a, b)
        .ok_or_else(|| ExpressionError::type_error(format!("{a} and {b} are not comparable")))
}

/// The [effective boolean value](https://www.w3.org/TR/sparql11-query/#ebv) of a term.
pub fn effective_boolean_value(term: &Term) -> Result<bool, ExpressionError> {
    let Term::Literal(literal) = term else {
        return Err(ExpressionError::type_error(format!(
            "{term} has no effective boolean value"
        )));
    };
    if literal.datatype() == xsd::BOOLEAN {
        return Boolean::from_str(literal.value())
            .map(Into::into)
            .map_err(|_| ExpressionError::type_error(format!("{literal} is not a valid boolean")));
    }
    if literal.datatype() == xsd::STRING {
        return Ok(!literal.value().is_empty());
    }
    if let Some(value) = NumericValue::from_literal(literal) {
        return Ok(value.to_boolean());
    }
    if literal.datatype() == rdf::LANG_STRING {
        return Err(ExpressionError::type_error(
            "language-tagged strings have no effective boolean value",
        ));
    }
    Err(ExpressionError::type_error(format!(
        "{literal} has no effective boolean value"
    )))
}
