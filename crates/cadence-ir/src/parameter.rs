//! Parameter expressions.
//!
//! Gate angles and the circuit global phase are both carried as
//! [`ParameterExpression`]s so that passes can keep adding numeric phase
//! contributions to a circuit whose phase is still symbolic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;

/// A symbolic or numeric parameter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A numeric value.
    Constant(f64),
    /// A free symbol.
    Symbol(String),
    /// The constant π.
    Pi,
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Addition.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Subtraction.
    Sub(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Multiplication.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Division.
    Div(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl Default for ParameterExpression {
    fn default() -> Self {
        ParameterExpression::Constant(0.0)
    }
}

impl ParameterExpression {
    /// A numeric value.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// A free symbol.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// The constant π.
    pub fn pi() -> Self {
        ParameterExpression::Pi
    }

    /// Whether any free symbol occurs in the expression.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Constant(_) | ParameterExpression::Pi => false,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    /// Evaluate to a number, if no symbol is left.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Pi => Some(PI),
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Sub(a, b) => Some(a.as_f64()? - b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            ParameterExpression::Div(a, b) => {
                let divisor = b.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Some(a.as_f64()? / divisor)
            }
        }
    }

    /// Whether the expression is numerically zero.
    pub fn is_zero(&self) -> bool {
        self.as_f64() == Some(0.0)
    }

    /// All free symbols, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.visit(&mut |expr| {
            if let ParameterExpression::Symbol(name) = expr {
                set.insert(name.clone());
            }
        });
        set
    }

    fn visit(&self, f: &mut impl FnMut(&ParameterExpression)) {
        f(self);
        match self {
            ParameterExpression::Constant(_)
            | ParameterExpression::Pi
            | ParameterExpression::Symbol(_) => {}
            ParameterExpression::Neg(e) => e.visit(f),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => {
                a.visit(f);
                b.visit(f);
            }
        }
    }

    /// Rebuild the expression bottom-up, letting `leaf` rewrite leaves.
    fn rebuild(&self, leaf: &impl Fn(&ParameterExpression) -> ParameterExpression) -> Self {
        let pair = |a: &Self, b: &Self| (Box::new(a.rebuild(leaf)), Box::new(b.rebuild(leaf)));
        match self {
            ParameterExpression::Constant(_)
            | ParameterExpression::Pi
            | ParameterExpression::Symbol(_) => leaf(self),
            ParameterExpression::Neg(e) => ParameterExpression::Neg(Box::new(e.rebuild(leaf))),
            ParameterExpression::Add(a, b) => {
                let (a, b) = pair(a, b);
                ParameterExpression::Add(a, b)
            }
            ParameterExpression::Sub(a, b) => {
                let (a, b) = pair(a, b);
                ParameterExpression::Sub(a, b)
            }
            ParameterExpression::Mul(a, b) => {
                let (a, b) = pair(a, b);
                ParameterExpression::Mul(a, b)
            }
            ParameterExpression::Div(a, b) => {
                let (a, b) = pair(a, b);
                ParameterExpression::Div(a, b)
            }
        }
    }

    /// Replace a symbol by a value.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        self.rebuild(&|leaf| match leaf {
            ParameterExpression::Symbol(n) if n == name => ParameterExpression::Constant(value),
            other => other.clone(),
        })
    }

    /// Fold every numeric subexpression into a constant.
    pub fn simplify(&self) -> Self {
        if let Some(v) = self.as_f64() {
            return ParameterExpression::Constant(v);
        }
        match self {
            ParameterExpression::Neg(e) => ParameterExpression::Neg(Box::new(e.simplify())),
            ParameterExpression::Add(a, b) => {
                ParameterExpression::Add(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            ParameterExpression::Sub(a, b) => {
                ParameterExpression::Sub(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            ParameterExpression::Mul(a, b) => {
                ParameterExpression::Mul(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            ParameterExpression::Div(a, b) => {
                ParameterExpression::Div(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            _ => self.clone(),
        }
    }

    /// Add a numeric phase contribution.
    ///
    /// Numeric expressions stay folded to a single constant. For symbolic
    /// expressions of the form `sym + c` the constant part is folded in place,
    /// so repeated accumulation does not grow the tree.
    #[must_use]
    pub fn accumulate(&self, value: f64) -> Self {
        if value == 0.0 {
            return self.clone();
        }
        if let Some(v) = self.as_f64() {
            return ParameterExpression::Constant(v + value);
        }
        if let ParameterExpression::Add(a, b) = self {
            if let Some(c) = b.as_f64() {
                let folded = c + value;
                if folded == 0.0 {
                    return (**a).clone();
                }
                return ParameterExpression::Add(a.clone(), Box::new(folded.into()));
            }
        }
        ParameterExpression::Add(Box::new(self.clone()), Box::new(value.into()))
    }

    /// Compare two expressions, numerically within `tolerance` when both
    /// evaluate, structurally (after folding constants) otherwise.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() <= tolerance,
            (None, None) => self.simplify() == other.simplify(),
            _ => false,
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(name) => write!(f, "{name}"),
            ParameterExpression::Pi => write!(f, "pi"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Sub(a, b) => write!(f, "({a} - {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
            ParameterExpression::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }
}

impl From<&str> for ParameterExpression {
    fn from(name: &str) -> Self {
        ParameterExpression::Symbol(name.to_string())
    }
}

impl std::ops::Add for ParameterExpression {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        ParameterExpression::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for ParameterExpression {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        ParameterExpression::Sub(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for ParameterExpression {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        ParameterExpression::Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Div for ParameterExpression {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        ParameterExpression::Div(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self::Output {
        ParameterExpression::Neg(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic_detection() {
        assert!(!ParameterExpression::pi().is_symbolic());
        let p = ParameterExpression::symbol("theta") * ParameterExpression::constant(2.0);
        assert!(p.is_symbolic());
        assert_eq!(p.as_f64(), None);
        assert!(p.symbols().contains("theta"));
    }

    #[test]
    fn test_bind() {
        let p = ParameterExpression::symbol("theta") + ParameterExpression::pi();
        let bound = p.bind("theta", PI / 2.0);
        assert!(!bound.is_symbolic());
        assert!((bound.as_f64().unwrap() - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_accumulate_numeric() {
        let phase = ParameterExpression::default().accumulate(PI).accumulate(PI);
        assert_eq!(phase, ParameterExpression::Constant(2.0 * PI));
    }

    #[test]
    fn test_accumulate_symbolic_folds_constant() {
        let phase = ParameterExpression::symbol("a").accumulate(1.0).accumulate(2.0);
        assert_eq!(
            phase,
            ParameterExpression::symbol("a") + ParameterExpression::constant(3.0)
        );
        assert_eq!(phase.bind("a", 1.0).as_f64(), Some(4.0));
    }

    #[test]
    fn test_approx_eq() {
        let a = ParameterExpression::pi();
        let b = ParameterExpression::constant(PI + 1e-12);
        assert!(a.approx_eq(&b, 1e-9));
        assert!(!a.approx_eq(&ParameterExpression::symbol("x"), 1e-9));
        let s1 = ParameterExpression::symbol("x") + ParameterExpression::constant(1.0);
        let s2 = ParameterExpression::symbol("x")
            + (ParameterExpression::constant(0.5) + ParameterExpression::constant(0.5));
        assert!(s1.approx_eq(&s2, 1e-9));
    }
}
