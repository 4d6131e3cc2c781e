#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

/// Trait for types usable as variable names in expressions and problems.
///
/// Blanket-implemented; any ordered, printable, clonable, thread-safe type
/// qualifies, so domain layers can use enums rather than raw strings.
pub trait VariableName:
    std::fmt::Debug + std::fmt::Display + PartialOrd + Ord + PartialEq + Eq + Clone + Send + Sync
{
}

impl<T> VariableName for T where
    T: std::fmt::Debug
        + std::fmt::Display
        + PartialOrd
        + Ord
        + PartialEq
        + Eq
        + Clone
        + Send
        + Sync
{
}

/// A linear expression with integer coefficients, e.g. `2*a + 3*b - 4`.
///
/// Built from [Expr::var] and [Expr::constant] and combined through the
/// overloaded `+`, `-` and `*` operators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expr<V: VariableName> {
    coefs: BTreeMap<V, i32>,
    constant: i32,
}

impl<V: VariableName> Default for Expr<V> {
    fn default() -> Self {
        Expr {
            coefs: BTreeMap::new(),
            constant: 0,
        }
    }
}

/// Comparison symbol of a [Constraint].
///
/// Only equality and "less-than" are representable; "more-than" is encoded
/// by flipping every sign, which keeps constraint comparison simple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Sign {
    Equals,
    #[default]
    LessThan,
}

/// A linear constraint. Internally every term is moved to the left-hand
/// side and compared to zero: `expr {=, <=} 0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Constraint<V: VariableName> {
    expr: Expr<V>,
    sign: Sign,
}

impl<V: VariableName> Expr<V> {
    /// Expression made of a single variable with coefficient 1.
    pub fn var<T: Into<V>>(name: T) -> Self {
        Expr {
            coefs: BTreeMap::from([(name.into(), 1)]),
            constant: 0,
        }
    }

    /// Constant expression with no variables.
    pub fn constant(number: i32) -> Self {
        Expr {
            coefs: BTreeMap::new(),
            constant: number,
        }
    }

    pub fn variables(&self) -> BTreeSet<V> {
        self.coefs.keys().cloned().collect()
    }

    /// Coefficient of `var`, or None when the variable does not appear.
    pub fn get(&self, var: &V) -> Option<i32> {
        self.coefs.get(var).copied()
    }

    pub fn get_constant(&self) -> i32 {
        self.constant
    }

    /// Iterates over `(variable, coefficient)` pairs in name order.
    pub fn coefs(&self) -> impl Iterator<Item = (&V, i32)> {
        self.coefs.iter().map(|(v, c)| (v, *c))
    }

    pub fn is_empty(&self) -> bool {
        self.coefs.is_empty()
    }

    /// Removes variables whose coefficient collapsed to 0.
    pub fn clean(&mut self) {
        self.coefs.retain(|_k, v| *v != 0);
    }

    pub fn cleaned(&self) -> Expr<V> {
        let mut output = self.clone();
        output.clean();
        output
    }

    /// Evaluates the expression against a full assignment.
    pub fn eval(&self, values: &BTreeMap<V, i32>) -> i32 {
        let mut acc = self.constant;
        for (var, coef) in &self.coefs {
            acc += coef * values.get(var).copied().unwrap_or(0);
        }
        acc
    }

    pub fn leq(&self, rhs: &Expr<V>) -> Constraint<V> {
        Constraint {
            expr: self - rhs,
            sign: Sign::LessThan,
        }
    }

    pub fn geq(&self, rhs: &Expr<V>) -> Constraint<V> {
        Constraint {
            expr: rhs - self,
            sign: Sign::LessThan,
        }
    }

    pub fn eq(&self, rhs: &Expr<V>) -> Constraint<V> {
        Constraint {
            expr: self - rhs,
            sign: Sign::Equals,
        }
    }
}

impl<V: VariableName> Constraint<V> {
    pub fn variables(&self) -> BTreeSet<V> {
        self.expr.variables()
    }

    pub fn get_var(&self, var: &V) -> Option<i32> {
        self.expr.get(var)
    }

    pub fn get_sign(&self) -> Sign {
        self.sign
    }

    pub fn get_constant(&self) -> i32 {
        self.expr.get_constant()
    }

    pub fn coefs(&self) -> impl Iterator<Item = (&V, i32)> {
        self.expr.coefs()
    }

    pub fn clean(&mut self) {
        self.expr.clean();
    }

    pub fn cleaned(&self) -> Constraint<V> {
        let mut output = self.clone();
        output.clean();
        output
    }

    /// Whether a full assignment satisfies the constraint.
    pub fn is_satisfied(&self, values: &BTreeMap<V, i32>) -> bool {
        let lhs = self.expr.eval(values);
        match self.sign {
            Sign::Equals => lhs == 0,
            Sign::LessThan => lhs <= 0,
        }
    }
}

impl<V: VariableName> std::fmt::Display for Expr<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.coefs.is_empty() && self.constant == 0 {
            write!(f, "0")?;
            return Ok(());
        }

        let mut it = self.coefs.iter().peekable();
        while let Some((key, value)) = it.next() {
            if *value < 0 {
                write!(f, "({})*{}", value, key)?;
            } else {
                write!(f, "{}*{}", value, key)?;
            }

            if it.peek().is_some() || self.constant != 0 {
                write!(f, " + ")?;
            }
        }

        if self.constant != 0 || self.coefs.is_empty() {
            if self.constant < 0 {
                write!(f, "({})", self.constant)?
            } else {
                write!(f, "{}", self.constant)?
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Sign::Equals => "=",
                Sign::LessThan => "<=",
            }
        )
    }
}

impl<V: VariableName> std::fmt::Display for Constraint<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} 0", self.expr, self.sign)
    }
}

impl<V: VariableName> std::ops::Add for &Expr<V> {
    type Output = Expr<V>;

    fn add(self, rhs: &Expr<V>) -> Self::Output {
        let mut output = self.clone();

        for (key, value) in rhs.coefs.iter() {
            if let Some(coef) = output.coefs.get_mut(key) {
                *coef += value;
            } else {
                output.coefs.insert(key.clone(), *value);
            }
        }

        output.constant += rhs.constant;

        output
    }
}

impl<V: VariableName> std::ops::Add for Expr<V> {
    type Output = Expr<V>;

    fn add(self, rhs: Expr<V>) -> Self::Output {
        &self + &rhs
    }
}

impl<V: VariableName> std::ops::Add<Expr<V>> for &Expr<V> {
    type Output = Expr<V>;

    fn add(self, rhs: Expr<V>) -> Self::Output {
        self + &rhs
    }
}

impl<V: VariableName> std::ops::Add<&Expr<V>> for Expr<V> {
    type Output = Expr<V>;

    fn add(self, rhs: &Expr<V>) -> Self::Output {
        &self + rhs
    }
}

impl<V: VariableName> std::ops::Add<i32> for &Expr<V> {
    type Output = Expr<V>;

    fn add(self, rhs: i32) -> Self::Output {
        self + Expr::constant(rhs)
    }
}

impl<V: VariableName> std::ops::Add<i32> for Expr<V> {
    type Output = Expr<V>;

    fn add(self, rhs: i32) -> Self::Output {
        &self + rhs
    }
}

impl<V: VariableName> std::ops::Mul<&Expr<V>> for i32 {
    type Output = Expr<V>;

    fn mul(self, rhs: &Expr<V>) -> Self::Output {
        let mut output = rhs.clone();

        for (_key, value) in output.coefs.iter_mut() {
            *value *= self;
        }

        output.constant *= self;

        output
    }
}

impl<V: VariableName> std::ops::Mul<Expr<V>> for i32 {
    type Output = Expr<V>;

    fn mul(self, rhs: Expr<V>) -> Self::Output {
        self * &rhs
    }
}

impl<V: VariableName> std::ops::Neg for &Expr<V> {
    type Output = Expr<V>;

    fn neg(self) -> Self::Output {
        (-1) * self
    }
}

impl<V: VariableName> std::ops::Neg for Expr<V> {
    type Output = Expr<V>;

    fn neg(self) -> Self::Output {
        -&self
    }
}

impl<V: VariableName> std::ops::Sub for &Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: &Expr<V>) -> Self::Output {
        self + (-1) * rhs
    }
}

impl<V: VariableName> std::ops::Sub for Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: Expr<V>) -> Self::Output {
        &self - &rhs
    }
}

impl<V: VariableName> std::ops::Sub<Expr<V>> for &Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: Expr<V>) -> Self::Output {
        self - &rhs
    }
}

impl<V: VariableName> std::ops::Sub<&Expr<V>> for Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: &Expr<V>) -> Self::Output {
        &self - rhs
    }
}

impl<V: VariableName> std::ops::Sub<i32> for &Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: i32) -> Self::Output {
        self + (-rhs)
    }
}

impl<V: VariableName> std::ops::Sub<i32> for Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: i32) -> Self::Output {
        &self - rhs
    }
}
