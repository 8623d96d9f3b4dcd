use crate::error::QueryEvaluationError;
use oxrdf::{Term, Variable};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single solution mapping: variable name to value.
///
/// A variable is either absent (never mentioned by the pattern that produced the binding),
/// or present with a value, or present but explicitly unbound (e.g. an `OPTIONAL` that did not match
/// or an aggregate that failed).
///
/// Bindings are cheap to clone and copy-on-write: [`Binding::with`] and [`Binding::with_unbound`]
/// never mutate a binding that is shared with someone else.
///
/// ```
/// use oxrdf::{Literal, Variable};
/// use sparexec::Binding;
///
/// let x = Variable::new("x")?;
/// let binding = Binding::default().with(x.clone(), Literal::from(1));
/// assert_eq!(binding.get(&x), Some(&Literal::from(1).into()));
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Binding {
    values: Arc<BTreeMap<Variable, Option<Term>>>,
}

impl Binding {
    /// Returns the value bound to the variable, if any.
    #[inline]
    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.values.get(variable)?.as_ref()
    }

    /// Returns if the variable is mentioned by this binding, bound or not.
    #[inline]
    pub fn contains(&self, variable: &Variable) -> bool {
        self.values.contains_key(variable)
    }

    /// Returns if the variable is bound to a value.
    #[inline]
    pub fn is_bound(&self, variable: &Variable) -> bool {
        self.get(variable).is_some()
    }

    /// Returns if the variable is mentioned but explicitly unbound.
    #[inline]
    pub fn is_unbound(&self, variable: &Variable) -> bool {
        matches!(self.values.get(variable), Some(None))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The mentioned variables, bound or not.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.values.keys()
    }

    /// The mentioned variables with their value (`None` for the unbound ones).
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, Option<&Term>)> {
        self.values.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Returns a binding where `variable` is bound to `value`.
    #[must_use]
    pub fn with(mut self, variable: Variable, value: impl Into<Term>) -> Self {
        Arc::make_mut(&mut self.values).insert(variable, Some(value.into()));
        self
    }

    /// Returns a binding where `variable` is mentioned but unbound.
    ///
    /// If the variable is already bound its value is dropped.
    #[must_use]
    pub fn with_unbound(mut self, variable: Variable) -> Self {
        Arc::make_mut(&mut self.values).insert(variable, None);
        self
    }

    /// Two bindings are compatible on `join_variables` iff, for each of them, either side leaves it unbound
    /// or both sides agree on its value.
    pub fn is_compatible_with(&self, other: &Self, join_variables: &[Variable]) -> bool {
        join_variables
            .iter()
            .all(|v| match (self.get(v), other.get(v)) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            })
    }

    /// Returns if the two bindings share at least one variable bound on both sides.
    pub fn shares_bound_variable_with(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .values
            .iter()
            .any(|(k, v)| v.is_some() && large.is_bound(k))
    }

    /// Merges two bindings assumed to be compatible.
    ///
    /// Bound values win over explicit unbound markers.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let (mut base, extra) = if self.len() >= other.len() {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        let values = Arc::make_mut(&mut base.values);
        for (variable, value) in extra.values.iter() {
            match values.get_mut(variable) {
                Some(current @ None) => current.clone_from(value),
                Some(Some(_)) => (),
                None => {
                    values.insert(variable.clone(), value.clone());
                }
            }
        }
        base
    }

    /// Merges two bindings if they are compatible on every shared variable.
    pub fn combine_with(&self, other: &Self) -> Option<Self> {
        for (variable, value) in other.values.iter() {
            if let (Some(value), Some(current)) = (value, self.get(variable)) {
                if value != current {
                    return None;
                }
            }
        }
        Some(self.merge(other))
    }
}

/// A stream of bindings, the unit of exchange between operators.
pub type SolutionIter<'a> = Box<dyn Iterator<Item = Result<Binding, QueryEvaluationError>> + 'a>;

impl FromIterator<(Variable, Term)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Self {
            values: Arc::new(iter.into_iter().map(|(k, v)| (k, Some(v))).collect()),
        }
    }
}

impl FromIterator<(Variable, Option<Term>)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Variable, Option<Term>)>>(iter: I) -> Self {
        Self {
            values: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (variable, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if let Some(value) = value {
                write!(f, "{variable} -> {value}")?;
            } else {
                write!(f, "{variable} -> UNDEF")?;
            }
        }
        f.write_str("}")
    }
}
