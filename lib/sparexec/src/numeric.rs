//! XSD numeric values, the `xsd:integer < xsd:decimal < xsd:float < xsd:double` promotion lattice and
//! the three-valued term comparison used by `MIN`, `MAX`, `ORDER BY`-like operators and `<`/`>`.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Literal, Term};
use oxsdatatypes::{Boolean, DateTime, Decimal, Double, Float, Integer};
use std::cmp::Ordering;
use std::str::FromStr;

/// Rank of a numeric type in the promotion lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NumericRank {
    #[default]
    Integer,
    Decimal,
    Float,
    Double,
}

/// A value of one of the four XSD numeric primitive types.
///
/// Derived integer types (`xsd:int`, `xsd:nonNegativeInteger`...) are parsed as [`NumericValue::Integer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Integer(Integer),
    Decimal(Decimal),
    Float(Float),
    Double(Double),
}

impl NumericValue {
    /// Parses a term as a numeric value.
    ///
    /// Returns `None` if the term is not a literal with a numeric datatype or if its lexical form is invalid.
    pub fn from_term(term: &Term) -> Option<Self> {
        if let Term::Literal(literal) = term {
            Self::from_literal(literal)
        } else {
            None
        }
    }

    pub fn from_literal(literal: &Literal) -> Option<Self> {
        let value = literal.value();
        let datatype = literal.datatype();
        if datatype == xsd::INTEGER
            || datatype == xsd::BYTE
            || datatype == xsd::SHORT
            || datatype == xsd::INT
            || datatype == xsd::LONG
            || datatype == xsd::UNSIGNED_BYTE
            || datatype == xsd::UNSIGNED_SHORT
            || datatype == xsd::UNSIGNED_INT
            || datatype == xsd::UNSIGNED_LONG
            || datatype == xsd::POSITIVE_INTEGER
            || datatype == xsd::NEGATIVE_INTEGER
            || datatype == xsd::NON_POSITIVE_INTEGER
            || datatype == xsd::NON_NEGATIVE_INTEGER
        {
            Integer::from_str(value).ok().map(Self::Integer)
        } else if datatype == xsd::DECIMAL {
            Decimal::from_str(value).ok().map(Self::Decimal)
        } else if datatype == xsd::FLOAT {
            Float::from_str(value).ok().map(Self::Float)
        } else if datatype == xsd::DOUBLE {
            Double::from_str(value).ok().map(Self::Double)
        } else {
            None
        }
    }

    pub fn rank(&self) -> NumericRank {
        match self {
            Self::Integer(_) => NumericRank::Integer,
            Self::Decimal(_) => NumericRank::Decimal,
            Self::Float(_) => NumericRank::Float,
            Self::Double(_) => NumericRank::Double,
        }
    }

    /// Converts the value to the given rank.
    ///
    /// Returns `None` when asked to demote (e.g. a `Float` to `Decimal`).
    pub fn promote(self, rank: NumericRank) -> Option<Self> {
        Some(match (self, rank) {
            (Self::Integer(v), NumericRank::Integer) => Self::Integer(v),
            (Self::Integer(v), NumericRank::Decimal) => Self::Decimal(v.into()),
            (Self::Integer(v), NumericRank::Float) => Self::Float(v.into()),
            (Self::Integer(v), NumericRank::Double) => Self::Double(v.into()),
            (Self::Decimal(v), NumericRank::Decimal) => Self::Decimal(v),
            (Self::Decimal(v), NumericRank::Float) => Self::Float(v.into()),
            (Self::Decimal(v), NumericRank::Double) => Self::Double(v.into()),
            (Self::Float(v), NumericRank::Float) => Self::Float(v),
            (Self::Float(v), NumericRank::Double) => Self::Double(v.into()),
            (Self::Double(v), NumericRank::Double) => Self::Double(v),
            _ => return None,
        })
    }

    /// Adds two values after promoting both to the highest of their ranks.
    ///
    /// Returns `None` on `xsd:integer` or `xsd:decimal` overflow.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        let rank = self.rank().max(other.rank());
        Some(match (self.promote(rank)?, other.promote(rank)?) {
            (Self::Integer(a), Self::Integer(b)) => Self::Integer(a.checked_add(b)?),
            (Self::Decimal(a), Self::Decimal(b)) => Self::Decimal(a.checked_add(b)?),
            (Self::Float(a), Self::Float(b)) => Self::Float(a + b),
            (Self::Double(a), Self::Double(b)) => Self::Double(a + b),
            _ => return None,
        })
    }

    /// Compares two values after promoting both to the highest of their ranks.
    ///
    /// Returns `None` if one of them is `NaN`.
    pub fn compare(self, other: Self) -> Option<Ordering> {
        let rank = self.rank().max(other.rank());
        match (self.promote(rank)?, other.promote(rank)?) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(&b)),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(&b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }

    /// The `xsd:boolean` cast of this value, i.e. its effective boolean value.
    pub fn to_boolean(self) -> bool {
        match self {
            Self::Integer(v) => Boolean::from(v).into(),
            Self::Decimal(v) => Boolean::from(v).into(),
            Self::Float(v) => Boolean::from(v).into(),
            Self::Double(v) => Boolean::from(v).into(),
        }
    }
}

impl From<NumericValue> for Literal {
    #[inline]
    fn from(value: NumericValue) -> Self {
        match value {
            NumericValue::Integer(v) => v.into(),
            NumericValue::Decimal(v) => v.into(),
            NumericValue::Float(v) => v.into(),
            NumericValue::Double(v) => v.into(),
        }
    }
}

impl From<NumericValue> for Term {
    #[inline]
    fn from(value: NumericValue) -> Self {
        Literal::from(value).into()
    }
}

/// Running sums kept in parallel at every rank of the promotion lattice.
///
/// Each input is added to the totals at the current maximal rank and above, so that a later input of
/// a higher rank can promote the sum without losing what was accumulated at lower ranks.
/// An overflowing `xsd:integer` or `xsd:decimal` total is poisoned and yields no value if it is the final rank.
#[derive(Debug, Clone, Copy)]
pub struct NumericTotals {
    rank: NumericRank,
    integer: Option<Integer>,
    decimal: Option<Decimal>,
    float: Float,
    double: Double,
}

impl Default for NumericTotals {
    fn default() -> Self {
        Self {
            rank: NumericRank::Integer,
            integer: Some(Integer::from(0)),
            decimal: Some(Decimal::from(0)),
            float: Float::from(0_u8),
            double: Double::from(0_u8),
        }
    }
}

impl NumericTotals {
    pub fn add(&mut self, value: NumericValue) {
        self.rank = self.rank.max(value.rank());
        if self.rank <= NumericRank::Integer {
            if let NumericValue::Integer(v) = value {
                self.integer = self.integer.and_then(|t| t.checked_add(v));
            }
        }
        if self.rank <= NumericRank::Decimal {
            if let Some(NumericValue::Decimal(v)) = value.promote(NumericRank::Decimal) {
                self.decimal = self.decimal.and_then(|t| t.checked_add(v));
            }
        }
        if let Some(NumericValue::Float(v)) = value.promote(NumericRank::Float) {
            self.float = self.float + v;
        }
        if let Some(NumericValue::Double(v)) = value.promote(NumericRank::Double) {
            self.double = self.double + v;
        }
    }

    /// The highest rank seen so far.
    pub fn rank(&self) -> NumericRank {
        self.rank
    }

    /// The total at the highest rank seen so far.
    pub fn total(&self) -> Option<NumericValue> {
        Some(match self.rank {
            NumericRank::Integer => NumericValue::Integer(self.integer?),
            NumericRank::Decimal => NumericValue::Decimal(self.decimal?),
            NumericRank::Float => NumericValue::Float(self.float),
            NumericRank::Double => NumericValue::Double(self.double),
        })
    }

    /// The total divided by `count`, integer totals being divided as `xsd:decimal`.
    pub fn average(&self, count: u64) -> Option<NumericValue> {
        if count == 0 {
            return Some(NumericValue::Integer(Integer::from(0)));
        }
        Some(match self.rank {
            NumericRank::Integer => NumericValue::Decimal(
                Decimal::from(self.integer?).checked_div(Decimal::from(count))?,
            ),
            NumericRank::Decimal => {
                NumericValue::Decimal(self.decimal?.checked_div(Decimal::from(count))?)
            }
            NumericRank::Float => {
                NumericValue::Float(self.float / Float::from(Decimal::from(count)))
            }
            NumericRank::Double => {
                NumericValue::Double(self.double / Double::from(Decimal::from(count)))
            }
        })
    }
}

/// Three-valued comparison of two RDF terms.
///
/// Numerics compare by value across the lattice, simple literals and `xsd:string` by code point,
/// language-tagged strings only with the same language tag, `xsd:boolean` and `xsd:dateTime` by value,
/// and IRIs and blank nodes are only comparable for equality. Anything else is incomparable.
pub fn compare_terms(a: &Term, b: &Term) -> Option<Ordering> {
    match (a, b) {
        (Term::Literal(a), Term::Literal(b)) => compare_literals(a, b),
        (Term::NamedNode(a), Term::NamedNode(b)) => (a == b).then_some(Ordering::Equal),
        (Term::BlankNode(a), Term::BlankNode(b)) => (a == b).then_some(Ordering::Equal),
        _ => None,
    }
}

fn compare_literals(a: &Literal, b: &Literal) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (NumericValue::from_literal(a), NumericValue::from_literal(b)) {
        return a.compare(b);
    }
    let (a_datatype, b_datatype) = (a.datatype(), b.datatype());
    if a_datatype != b_datatype {
        return None;
    }
    if a_datatype == xsd::STRING {
        Some(a.value().cmp(b.value()))
    } else if a_datatype == rdf::LANG_STRING {
        (a.language() == b.language()).then(|| a.value().cmp(b.value()))
    } else if a_datatype == xsd::BOOLEAN {
        let a = Boolean::from_str(a.value()).ok()?;
        let b = Boolean::from_str(b.value()).ok()?;
        Some(bool::from(a).cmp(&bool::from(b)))
    } else if a_datatype == xsd::DATE_TIME {
        DateTime::from_str(a.value())
            .ok()?
            .partial_cmp(&DateTime::from_str(b.value()).ok()?)
    } else {
        (a == b).then_some(Ordering::Equal)
    }
}
