pub mod linexpr;
pub mod solvers;


use std::collections::BTreeMap;

use thiserror::Error;

use linexpr::{Constraint, Expr, Sign, VariableName};

/// Optimization direction for the objective function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

impl std::fmt::Display for ObjectiveSense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "Minimize"),
            ObjectiveSense::Maximize => write!(f, "Maximize"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VariableType {
    Binary,
    Integer,
}

/// Domain description of a model variable.
///
/// Built with [Variable::binary] or [Variable::integer], the latter chained
/// with [Variable::min] and [Variable::max]. The solver enumerates domains,
/// so integer variables must end up with finite bounds by build time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Variable {
    var_type: VariableType,
    min: Option<i32>,
    max: Option<i32>,
}

impl Variable {
    /// A 0/1 variable.
    pub fn binary() -> Self {
        Variable {
            var_type: VariableType::Binary,
            min: None,
            max: None,
        }
    }

    /// An integer variable. Bounds must be supplied with [Variable::min]
    /// and [Variable::max].
    pub fn integer() -> Self {
        Variable {
            var_type: VariableType::Integer,
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, m: i32) -> Self {
        self.min = Some(m);
        self
    }

    pub fn max(mut self, m: i32) -> Self {
        self.max = Some(m);
        self
    }

    pub fn get_type(&self) -> VariableType {
        self.var_type
    }

    /// Concrete `[lo, hi]` domain, or None for an unbounded integer.
    fn bounds(&self) -> Option<(i32, i32)> {
        match self.var_type {
            VariableType::Binary => {
                let lo = self.min.unwrap_or(0).max(0);
                let hi = self.max.unwrap_or(1).min(1);
                Some((lo, hi))
            }
            VariableType::Integer => Some((self.min?, self.max?)),
        }
    }
}

/// Possible errors when freezing a [ProblemBuilder] into a [Problem].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError<V: VariableName> {
    #[error("Variable {0} is used in constraint ({1}) but not explicitly declared")]
    UndeclaredVariableInConstraint(V, Constraint<V>),
    #[error("Variable {0} is used in the objective but not explicitly declared")]
    UndeclaredVariableInObjective(V),
    #[error("Integer variable {0} has no finite bounds")]
    UnboundedVariable(V),
    #[error("Variable {0} has an empty domain ({1} > {2})")]
    EmptyDomain(V, i32, i32),
}

pub type BuildResult<T, V> = std::result::Result<T, BuildError<V>>;

/// Builder for [Problem].
///
/// Declare variables with [ProblemBuilder::set_variable], add constraints
/// with [ProblemBuilder::add_constraint], optionally set an objective, then
/// freeze with [ProblemBuilder::build]. Every variable referenced by a
/// constraint or the objective must be declared.
#[derive(Debug, Clone)]
pub struct ProblemBuilder<V: VariableName> {
    variables: BTreeMap<V, Variable>,
    constraints: Vec<Constraint<V>>,
    objective: Expr<V>,
    objective_sense: ObjectiveSense,
}

impl<V: VariableName> Default for ProblemBuilder<V> {
    fn default() -> Self {
        ProblemBuilder {
            variables: BTreeMap::new(),
            constraints: Vec::new(),
            objective: Expr::default(),
            objective_sense: ObjectiveSense::default(),
        }
    }
}

impl<V: VariableName> ProblemBuilder<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable. Redeclaring overwrites the description.
    pub fn set_variable<T: Into<V>>(mut self, name: T, var: Variable) -> Self {
        self.variables.insert(name.into(), var);
        self
    }

    pub fn set_variables<U: Into<V>, T: IntoIterator<Item = (U, Variable)>>(
        mut self,
        vars: T,
    ) -> Self {
        for (name, var) in vars {
            self.variables.insert(name.into(), var);
        }
        self
    }

    pub fn add_constraint(mut self, constraint: Constraint<V>) -> Self {
        self.constraints.push(constraint.cleaned());
        self
    }

    pub fn add_constraints<T: IntoIterator<Item = Constraint<V>>>(mut self, constraints: T) -> Self {
        for constraint in constraints {
            self.constraints.push(constraint.cleaned());
        }
        self
    }

    /// Sets the objective function. Without one, any feasible solution is
    /// reported as optimal.
    pub fn set_objective(mut self, func: Expr<V>, sense: ObjectiveSense) -> Self {
        self.objective = func.cleaned();
        self.objective_sense = sense;
        self
    }

    pub fn get_variables(&self) -> &BTreeMap<V, Variable> {
        &self.variables
    }

    pub fn build(self) -> BuildResult<Problem<V>, V> {
        for constraint in &self.constraints {
            for var in constraint.variables() {
                if !self.variables.contains_key(&var) {
                    return Err(BuildError::UndeclaredVariableInConstraint(
                        var,
                        constraint.clone(),
                    ));
                }
            }
        }
        for var in self.objective.variables() {
            if !self.variables.contains_key(&var) {
                return Err(BuildError::UndeclaredVariableInObjective(var));
            }
        }

        let variables_vec: Vec<_> = self.variables.keys().cloned().collect();
        let mut variables_lookup = BTreeMap::new();
        for (i, var) in variables_vec.iter().enumerate() {
            variables_lookup.insert(var.clone(), i);
        }

        let mut lo = Vec::with_capacity(variables_vec.len());
        let mut hi = Vec::with_capacity(variables_vec.len());
        for var in &variables_vec {
            let desc = &self.variables[var];
            let (l, h) = desc
                .bounds()
                .ok_or_else(|| BuildError::UnboundedVariable(var.clone()))?;
            if l > h {
                return Err(BuildError::EmptyDomain(var.clone(), l, h));
            }
            lo.push(l);
            hi.push(h);
        }

        let n_constraints = self.constraints.len();
        let n_vars = variables_vec.len();

        use sprs::TriMat;

        let mut mat_tri = TriMat::new((n_constraints, n_vars));
        let mut signs = Vec::with_capacity(n_constraints);
        let mut constants = Vec::with_capacity(n_constraints);
        let mut constraints_for = vec![Vec::new(); n_vars];

        for (row, constraint) in self.constraints.iter().enumerate() {
            for (var, coef) in constraint.coefs() {
                let j = variables_lookup[var];
                mat_tri.add_triplet(row, j, coef);
                constraints_for[j].push(row);
            }
            signs.push(constraint.get_sign());
            constants.push(constraint.get_constant());
        }

        let mut objective = Vec::new();
        for (var, coef) in self.objective.coefs() {
            objective.push((variables_lookup[var], coef));
        }

        Ok(Problem {
            variables: self.variables,
            variables_vec,
            variables_lookup,
            lo,
            hi,
            constraints: self.constraints,
            mat: mat_tri.to_csr(),
            signs,
            constants,
            constraints_for,
            objective,
            objective_constant: self.objective.get_constant(),
            objective_sense: self.objective_sense,
        })
    }
}

/// A frozen integer-linear model.
///
/// Holds the variable table, the constraint matrix in CSR form, a
/// per-variable index of the constraint rows it appears in, and the
/// objective row. Built through [ProblemBuilder].
#[derive(Debug, Clone)]
pub struct Problem<V: VariableName> {
    variables: BTreeMap<V, Variable>,
    variables_vec: Vec<V>,
    variables_lookup: BTreeMap<V, usize>,
    lo: Vec<i32>,
    hi: Vec<i32>,
    constraints: Vec<Constraint<V>>,
    mat: sprs::CsMat<i32>,
    signs: Vec<Sign>,
    constants: Vec<i32>,
    constraints_for: Vec<Vec<usize>>,
    objective: Vec<(usize, i32)>,
    objective_constant: i32,
    objective_sense: ObjectiveSense,
}

impl<V: VariableName> Problem<V> {
    pub fn get_variables(&self) -> &BTreeMap<V, Variable> {
        &self.variables
    }

    pub fn get_constraints(&self) -> &[Constraint<V>] {
        &self.constraints
    }

    pub fn get_objective_sense(&self) -> ObjectiveSense {
        self.objective_sense
    }

    pub fn has_objective(&self) -> bool {
        !self.objective.is_empty()
    }

    pub fn var_count(&self) -> usize {
        self.variables_vec.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub(crate) fn variable_index(&self, var: &V) -> Option<usize> {
        self.variables_lookup.get(var).copied()
    }

    pub(crate) fn initial_lo(&self) -> &[i32] {
        &self.lo
    }

    pub(crate) fn initial_hi(&self) -> &[i32] {
        &self.hi
    }

    pub(crate) fn is_binary(&self, index: usize) -> bool {
        self.variables[&self.variables_vec[index]].get_type() == VariableType::Binary
    }

    pub(crate) fn rows_of(&self, index: usize) -> &[usize] {
        &self.constraints_for[index]
    }

    pub(crate) fn row_entries(&self, row: usize) -> Vec<(usize, i32)> {
        match self.mat.outer_view(row) {
            Some(view) => view.iter().map(|(j, c)| (j, *c)).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn row_sign(&self, row: usize) -> Sign {
        self.signs[row]
    }

    pub(crate) fn row_constant(&self, row: usize) -> i32 {
        self.constants[row]
    }

    pub(crate) fn objective_row(&self) -> &[(usize, i32)] {
        &self.objective
    }

    pub(crate) fn objective_constant(&self) -> i32 {
        self.objective_constant
    }

    /// Exact feasibility check of a full assignment (indexed like the
    /// internal variable table).
    pub(crate) fn is_feasible(&self, values: &[i32]) -> bool {
        for row in 0..self.constraints.len() {
            let mut lhs: i64 = self.constants[row] as i64;
            for (j, c) in self.row_entries(row) {
                lhs += c as i64 * values[j] as i64;
            }
            let ok = match self.signs[row] {
                Sign::Equals => lhs == 0,
                Sign::LessThan => lhs <= 0,
            };
            if !ok {
                return false;
            }
        }
        true
    }

    pub(crate) fn objective_value_of(&self, values: &[i32]) -> i32 {
        let mut acc = self.objective_constant as i64;
        for &(j, c) in &self.objective {
            acc += c as i64 * values[j] as i64;
        }
        acc as i32
    }
}

impl<V: VariableName> std::fmt::Display for Problem<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "variables : [")?;
        for v in self.variables.keys() {
            write!(f, " {}", v)?;
        }
        writeln!(f, " ]")?;

        writeln!(
            f,
            "objective : {} ({} terms)",
            self.objective_sense,
            self.objective.len()
        )?;

        write!(f, "constraints :")?;
        for (i, c) in self.constraints.iter().enumerate() {
            write!(f, "\n{}) {}", i, c)?;
        }

        Ok(())
    }
}

/// A full assignment of a [Problem]'s variables.
#[derive(Debug, Clone)]
pub struct Solution<'a, V: VariableName> {
    problem: &'a Problem<V>,
    values: Vec<i32>,
}

impl<'a, V: VariableName> Solution<'a, V> {
    pub(crate) fn new(problem: &'a Problem<V>, values: Vec<i32>) -> Self {
        Solution { problem, values }
    }

    pub fn get_problem(&self) -> &Problem<V> {
        self.problem
    }

    /// Value of a variable, or None when the name is not part of the model.
    pub fn get(&self, var: &V) -> Option<i32> {
        let i = self.problem.variables_lookup.get(var)?;
        Some(self.values[*i])
    }

    pub fn objective_value(&self) -> i32 {
        self.problem.objective_value_of(&self.values)
    }

    /// The assignment as a name-keyed map.
    pub fn to_map(&self) -> BTreeMap<V, i32> {
        self.problem
            .variables_vec
            .iter()
            .cloned()
            .zip(self.values.iter().copied())
            .collect()
    }
}

impl<'a, V: VariableName> std::fmt::Display for Solution<'a, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[ ")?;
        let slice: Vec<_> = self
            .problem
            .variables_vec
            .iter()
            .zip(self.values.iter())
            .map(|(var, val)| format!("{}: {}", var, val))
            .collect();
        write!(f, "{}", slice.join(", "))?;
        write!(f, " ]")?;

        Ok(())
    }
}
