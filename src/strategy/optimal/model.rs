//! Backend-neutral integer linear program

use std::fmt;
use std::io::{self, Write};

/// Index of a variable in an [`IlpModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Integer,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: i64,
    pub upper: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "="),
        }
    }
}

/// `Σ coefficient · variable  <relation>  rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, i64)>,
    pub relation: Relation,
    pub rhs: i64,
}

impl Constraint {
    /// Left-hand side under an assignment
    pub fn lhs(&self, values: &[i64]) -> i128 {
        self.terms
            .iter()
            .map(|&(v, c)| c as i128 * values.get(v.0).copied().unwrap_or(0) as i128)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        let lhs = self.lhs(values);
        let rhs = self.rhs as i128;
        match self.relation {
            Relation::Le => lhs <= rhs,
            Relation::Ge => lhs >= rhs,
            Relation::Eq => lhs == rhs,
        }
    }
}

/// A minimization problem over bounded integer variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IlpModel {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Vec<(VarId, i64)>,
}

impl IlpModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-negative integer variable
    pub fn integer(&mut self, name: impl Into<String>) -> VarId {
        self.add_variable(Variable {
            name: name.into(),
            kind: VarKind::Integer,
            lower: 0,
            upper: None,
        })
    }

    pub fn binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_variable(Variable {
            name: name.into(),
            kind: VarKind::Binary,
            lower: 0,
            upper: Some(1),
        })
    }

    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable);
        VarId(self.variables.len() - 1)
    }

    /// Add a constraint; zero coefficients are dropped and repeated variables merged
    pub fn constrain(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, i64)>,
        relation: Relation,
        rhs: i64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            terms: merge_terms(terms),
            relation,
            rhs,
        });
    }

    pub fn minimize(&mut self, terms: Vec<(VarId, i64)>) {
        self.objective = merge_terms(terms);
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &[(VarId, i64)] {
        &self.objective
    }

    pub fn objective_value(&self, values: &[i64]) -> i64 {
        self.objective
            .iter()
            .map(|&(v, c)| c * values.get(v.0).copied().unwrap_or(0))
            .sum()
    }

    /// Whether an assignment respects every bound and constraint
    pub fn is_feasible(&self, values: &[i64]) -> bool {
        values.len() == self.variables.len()
            && self
                .variables
                .iter()
                .zip(values)
                .all(|(var, &x)| x >= var.lower && var.upper.map_or(true, |u| x <= u))
            && self.constraints.iter().all(|c| c.is_satisfied(values))
    }

    /// Write the model in CPLEX LP format
    pub fn write_lp<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "\\ {} variables, {} constraints",
            self.variables.len(),
            self.constraints.len()
        )?;
        writeln!(out, "Minimize")?;
        write!(out, " obj:")?;
        if self.objective.is_empty() {
            match self.variables.first() {
                Some(first) => write!(out, " 0 {}", first.name)?,
                None => write!(out, " 0")?,
            }
        }
        self.write_terms(out, &self.objective)?;
        writeln!(out)?;

        writeln!(out, "Subject To")?;
        for c in &self.constraints {
            write!(out, " {}:", c.name)?;
            if c.terms.is_empty() {
                write!(out, " 0 {}", self.variables.first().map_or("x", |v| &v.name))?;
            }
            self.write_terms(out, &c.terms)?;
            writeln!(out, " {} {}", c.relation, c.rhs)?;
        }

        writeln!(out, "Bounds")?;
        for var in self.variables.iter().filter(|v| v.kind == VarKind::Integer) {
            match var.upper {
                Some(upper) => writeln!(out, " {} <= {} <= {}", var.lower, var.name, upper)?,
                None => writeln!(out, " {} >= {}", var.name, var.lower)?,
            }
        }

        self.write_section(out, "General", VarKind::Integer)?;
        self.write_section(out, "Binary", VarKind::Binary)?;
        writeln!(out, "End")
    }

    fn write_terms<W: Write>(&self, out: &mut W, terms: &[(VarId, i64)]) -> io::Result<()> {
        for &(v, c) in terms {
            let sign = if c < 0 { '-' } else { '+' };
            write!(out, " {} {} {}", sign, c.unsigned_abs(), self.variables[v.0].name)?;
        }
        Ok(())
    }

    fn write_section<W: Write>(&self, out: &mut W, title: &str, kind: VarKind) -> io::Result<()> {
        let names: Vec<&str> = self
            .variables
            .iter()
            .filter(|v| v.kind == kind)
            .map(|v| v.name.as_str())
            .collect();
        if names.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}", title)?;
        for chunk in names.chunks(8) {
            writeln!(out, " {}", chunk.join(" "))?;
        }
        Ok(())
    }
}

fn merge_terms(terms: Vec<(VarId, i64)>) -> Vec<(VarId, i64)> {
    let mut merged: Vec<(VarId, i64)> = Vec::with_capacity(terms.len());
    for (v, c) in terms {
        match merged.iter_mut().find(|(w, _)| *w == v) {
            Some(entry) => entry.1 += c,
            None => merged.push((v, c)),
        }
    }
    merged.retain(|&(_, c)| c != 0);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small_model() -> (IlpModel, VarId, VarId) {
        let mut model = IlpModel::new();
        let x = model.integer("x");
        let z = model.binary("z");
        model.constrain("c0", vec![(x, 1), (z, 2)], Relation::Ge, 3);
        model.minimize(vec![(x, 5), (z, 4)]);
        (model, x, z)
    }

    #[test]
    fn test_feasibility_and_objective() {
        let (model, _, _) = small_model();
        assert!(model.is_feasible(&[1, 1]));
        assert!(!model.is_feasible(&[0, 1]));
        assert!(!model.is_feasible(&[1, 2]));
        assert_eq!(model.objective_value(&[1, 1]), 9);
    }

    #[test]
    fn test_terms_merged() {
        let mut model = IlpModel::new();
        let x = model.integer("x");
        let y = model.integer("y");
        model.constrain("c", vec![(x, 2), (y, 1), (x, -2)], Relation::Eq, 0);
        assert_eq!(model.constraints()[0].terms, vec![(y, 1)]);
    }

    #[test]
    fn test_write_lp() {
        let (model, _, _) = small_model();
        let mut out = Vec::new();
        model.write_lp(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "\\ 2 variables, 1 constraints\n\
                        Minimize\n obj: + 5 x + 4 z\n\
                        Subject To\n c0: + 1 x + 2 z >= 3\n\
                        Bounds\n x >= 0\n\
                        General\n x\n\
                        Binary\n z\n\
                        End\n";
        assert_eq!(text, expected);
    }
}
