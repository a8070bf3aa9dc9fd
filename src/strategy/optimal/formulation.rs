//! Integer-program formulation of compression-tree synthesis
//!
//! For a fixed stage count `S` the model holds:
//!
//! ```text
//! N[s][c]        bits at stage s, column c            s = 0..=S
//! K[s][e][w][c]  instances of compressor e, width w, anchored at c
//! P+[s][c]       positive-residue pseudo-compressors  (overflow columns)
//! P-[s][c]       negative-residue pseudo-compressors  (overflow and upper window)
//!
//! Σ K·in + Σ P          >= N[s][c]
//! N[s+1][c]              = arrivals[s+1][c] + Σ K·out + Σ P·out
//! N[0][c]                = arrivals[0][c]
//! N[S][c]               <= final adder width
//! ```
//!
//! With a modulus the range of the heap value is bounded and the constant
//! of the negative residues is encoded as a two's complement vector `Z` of
//! constant-one bits. Each `Z[j]` takes a final adder row:
//!
//! ```text
//! Σ r-·P- + 2^W·T        = Σ 2^j·Z[j]
//! N[S][j] + Z[j]        <= final adder width
//! ```

use crate::catalog::pseudo::{column_weight, pseudo_compressor, residues, PseudoCache};
use crate::catalog::{Catalog, CompressorId, Shape};
use crate::error::CompressionError;
use crate::heap::{constant_width, HeapModel, RangeState};
use crate::solution::{ModularSummary, Placement, Solution};
use crate::strategy::config::{CompressionConfig, Mode};
use crate::strategy::modular::{first_overflow_column, in_upper_window};
use crate::strategy::optimal::model::{IlpModel, Relation, VarId};
use crate::strategy::Workspace;

/// Widest heap the modular formulation can weigh with 64-bit coefficients
pub const MAX_EXACT_MODULAR_WIDTH: usize = 62;

/// A compressor instance variable
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub stage: usize,
    pub compressor: CompressorId,
    pub middle_width: Option<usize>,
    pub column: usize,
    pub var: VarId,
}

/// A pseudo-compressor variable
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoInstance {
    pub stage: usize,
    pub column: usize,
    pub residue: i64,
    pub var: VarId,
}

/// The model for one stage count plus the maps to decode an assignment
#[derive(Debug, Clone)]
pub struct Formulation {
    model: IlpModel,
    stages: usize,
    width: usize,
    bits: Vec<Vec<VarId>>,
    instances: Vec<Instance>,
    pseudo: Vec<PseudoInstance>,
    /// `Z[j]`, empty without a modulus
    constant: Vec<VarId>,
    modulus: Option<u64>,
}

/// Area of a shape on the integer objective scale
pub fn scaled_area(area: f64, scale: f64) -> i64 {
    (area * scale).round() as i64
}

impl Formulation {
    /// Build the model for `stages` stages over the compressors in `usable`
    ///
    /// `objective_bound` caps the scaled area.
    pub fn build(
        heap: &HeapModel,
        catalog: &Catalog,
        usable: &[CompressorId],
        config: &CompressionConfig,
        stages: usize,
        objective_bound: Option<i64>,
    ) -> Result<Self, CompressionError> {
        let modulus = config.modulus;
        let width = match modulus {
            None => heap.width(),
            Some(m) => {
                if constant_width(m) > MAX_EXACT_MODULAR_WIDTH {
                    return Err(CompressionError::InvalidConfig(format!(
                        "modulus {} exceeds the exact modular limit of {} columns",
                        m, MAX_EXACT_MODULAR_WIDTH
                    )));
                }
                if heap.width() > MAX_EXACT_MODULAR_WIDTH {
                    return Err(CompressionError::InvalidConfig(format!(
                        "heap width {} exceeds the exact modular limit of {} columns",
                        heap.width(),
                        MAX_EXACT_MODULAR_WIDTH
                    )));
                }
                (heap.width().max(first_overflow_column(m) + 1) + 2).min(MAX_EXACT_MODULAR_WIDTH)
            }
        };
        let scale = config.optimal.area_scale;
        let mut model = IlpModel::new();

        let bits: Vec<Vec<VarId>> = (0..=stages)
            .map(|s| {
                (0..width)
                    .map(|c| model.integer(format!("N_{}_{}", s, c)))
                    .collect()
            })
            .collect();

        let mut formulation = Self {
            model,
            stages,
            width,
            bits,
            instances: Vec::new(),
            pseudo: Vec::new(),
            constant: Vec::new(),
            modulus,
        };
        formulation.add_instances(catalog, usable, config);
        if let Some(m) = modulus {
            formulation.add_pseudo(m);
            let model = &mut formulation.model;
            let constant = (0..constant_width(m))
                .map(|j| model.binary(format!("Z_{}", j)))
                .collect();
            formulation.constant = constant;
        }
        formulation.add_balance(heap, catalog, config.capacity())?;
        if let Some(m) = modulus {
            formulation.add_range(heap, m)?;
        }
        formulation.add_objective(catalog, scale, objective_bound);
        Ok(formulation)
    }

    pub fn model(&self) -> &IlpModel {
        &self.model
    }

    pub fn stages(&self) -> usize {
        self.stages
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn pseudo(&self) -> &[PseudoInstance] {
        &self.pseudo
    }

    /// Variable of `N[stage][column]`
    pub fn bits_var(&self, stage: usize, column: usize) -> VarId {
        self.bits[stage][column]
    }

    /// Constant-one bit variables `Z[j]`
    pub fn constant_vars(&self) -> &[VarId] {
        &self.constant
    }

    fn add_instances(&mut self, catalog: &Catalog, usable: &[CompressorId], config: &CompressionConfig) {
        let width_cap = config.optimal.max_variable_width;
        for stage in 0..self.stages {
            for &id in usable {
                let compressor = &catalog[id];
                let widths = compressor.middle_widths();
                let first = *widths.start();
                let last = (*widths.end()).min(width_cap.max(first)).min(self.width.max(first));
                for w in first..=last {
                    let shape = compressor.realize(w);
                    let middle_width = compressor.is_variable().then_some(w);
                    for column in 0..self.width {
                        if self.modulus.is_some() && self.spills(&shape, column) {
                            continue;
                        }
                        let name = match middle_width {
                            Some(w) => format!("K_{}_{}_{}_{}", stage, id.0, w, column),
                            None => format!("K_{}_{}_{}", stage, id.0, column),
                        };
                        let var = self.model.integer(name);
                        self.instances.push(Instance {
                            stage,
                            compressor: id,
                            middle_width,
                            column,
                            var,
                        });
                    }
                }
            }
        }
    }

    /// Whether a shape anchored at `column` has an output past the top column
    fn spills(&self, shape: &Shape, column: usize) -> bool {
        let base = shape.output_base(column);
        shape
            .outputs
            .iter()
            .rposition(|&o| o != 0)
            .is_some_and(|i| base + i >= self.width)
    }

    fn add_pseudo(&mut self, modulus: u64) {
        let overflow = first_overflow_column(modulus);
        for stage in 0..self.stages {
            for column in 0..self.width {
                let (positive, negative) = residues(column, modulus);
                let mut choices = Vec::new();
                if column >= overflow {
                    choices.push(positive);
                    if positive != 0 {
                        choices.push(negative);
                    }
                } else if in_upper_window(column, modulus) {
                    choices.push(negative);
                }
                for residue in choices {
                    let tag = if residue < 0 { "m" } else { "p" };
                    let var = self.model.integer(format!("P{}_{}_{}", tag, stage, column));
                    self.pseudo.push(PseudoInstance {
                        stage,
                        column,
                        residue,
                        var,
                    });
                }
            }
        }
    }

    fn add_balance(
        &mut self,
        heap: &HeapModel,
        catalog: &Catalog,
        capacity: u32,
    ) -> Result<(), CompressionError> {
        let width = self.width;
        let mut consume: Vec<Vec<Vec<(VarId, i64)>>> = vec![vec![Vec::new(); width]; self.stages];
        let mut produce: Vec<Vec<Vec<(VarId, i64)>>> =
            vec![vec![Vec::new(); width]; self.stages + 1];

        let shapes = self
            .instances
            .iter()
            .map(|inst| {
                let shape = catalog[inst.compressor].realize(inst.middle_width.unwrap_or(0));
                (inst.stage, inst.column, inst.var, shape)
            })
            .chain(self.pseudo.iter().map(|p| {
                (p.stage, p.column, p.var, pseudo_compressor(p.column, p.residue).realize(0))
            }));

        for (stage, column, var, shape) in shapes {
            for (i, &want) in shape.inputs.iter().enumerate() {
                let c = column + i;
                if c < width && want > 0 {
                    consume[stage][c].push((var, want as i64));
                }
            }
            let base = shape.output_base(column);
            for (i, &o) in shape.outputs.iter().enumerate() {
                let c = base + i;
                if c < width && o != 0 {
                    produce[stage + 1][c].push((var, -(o.unsigned_abs() as i64)));
                }
            }
        }

        for c in 0..width {
            let arrivals = heap.height(0, c).max(0) as i64;
            self.model.constrain(
                format!("arrive_{}", c),
                vec![(self.bits[0][c], 1)],
                Relation::Eq,
                arrivals,
            );
        }
        for (stage, row) in consume.into_iter().enumerate() {
            for (c, mut terms) in row.into_iter().enumerate() {
                terms.push((self.bits[stage][c], -1));
                self.model
                    .constrain(format!("consume_{}_{}", stage, c), terms, Relation::Ge, 0);
            }
        }
        for (stage, row) in produce.into_iter().enumerate().skip(1) {
            for (c, mut terms) in row.into_iter().enumerate() {
                terms.push((self.bits[stage][c], 1));
                let arrivals = heap.height(stage, c).max(0) as i64;
                self.model.constrain(
                    format!("produce_{}_{}", stage, c),
                    terms,
                    Relation::Eq,
                    arrivals,
                );
            }
        }
        for c in 0..width {
            let mut terms = vec![(self.bits[self.stages][c], 1)];
            if let Some(&z) = self.constant.get(c) {
                terms.push((z, 1));
            }
            self.model
                .constrain(format!("final_{}", c), terms, Relation::Le, capacity as i64);
        }

        let late = (self.stages + 1..heap.stage_count()).any(|s| heap.stage_total(s) > 0);
        if late {
            return Err(CompressionError::InvalidConfig(format!(
                "heap has input bits after stage {}",
                self.stages
            )));
        }
        Ok(())
    }

    fn add_range(&mut self, heap: &HeapModel, modulus: u64) -> Result<(), CompressionError> {
        let m = modulus as i128;
        let start = RangeState::from_heap(heap);
        let to_i64 = |x: i128| {
            i64::try_from(x).map_err(|_| {
                CompressionError::InvalidConfig(format!("range bound {} out of 64-bit range", x))
            })
        };

        let mut upper = Vec::new();
        let mut lower = Vec::new();
        for p in &self.pseudo {
            let v = column_weight(p.column);
            if p.residue >= 0 {
                upper.push((p.var, to_i64(p.residue as i128 - v)?));
            } else {
                upper.push((p.var, to_i64(-v)?));
                lower.push((p.var, p.residue));
            }
        }
        self.model
            .constrain("range_max", upper, Relation::Le, to_i64(m - 1 - start.max)?);
        self.model
            .constrain("range_min", lower.clone(), Relation::Ge, to_i64(-m - start.min)?);

        let wrap = self.model.integer("T");
        let mut terms = lower;
        terms.push((wrap, to_i64(column_weight(self.constant.len()))?));
        for (j, &z) in self.constant.iter().enumerate() {
            terms.push((z, -to_i64(column_weight(j))?));
        }
        self.model.constrain("constant", terms, Relation::Eq, 0);
        Ok(())
    }

    fn add_objective(&mut self, catalog: &Catalog, scale: f64, bound: Option<i64>) {
        let mut terms: Vec<(VarId, i64)> = self
            .instances
            .iter()
            .map(|inst| {
                let shape = catalog[inst.compressor].realize(inst.middle_width.unwrap_or(0));
                (inst.var, scaled_area(shape.area, scale))
            })
            .collect();
        terms.extend(self.pseudo.iter().map(|p| {
            let area = pseudo_compressor(p.column, p.residue).area;
            (p.var, scaled_area(area, scale))
        }));
        if let Some(bound) = bound {
            self.model
                .constrain("area_bound", terms.clone(), Relation::Le, bound);
        }
        self.model.minimize(terms);
    }

    /// Replay an assignment into a solution
    ///
    /// Bits not consumed by a placed compressor are carried as pass-throughs.
    /// Holes are applied during the replay when enabled, so the replayed
    /// heights never exceed the model's `N`.
    pub fn decode(
        &self,
        values: &[i64],
        heap: &HeapModel,
        catalog: &Catalog,
        config: &CompressionConfig,
        mode: Mode,
    ) -> Result<Solution, CompressionError> {
        if values.len() != self.model.variables().len() {
            return Err(CompressionError::Solver(format!(
                "assignment has {} values for {} variables",
                values.len(),
                self.model.variables().len()
            )));
        }
        let value = |var: VarId| values[var.0].max(0) as usize;

        let working = heap.clone().with_growable(self.modulus.is_some());
        let mut work = Workspace::new(working, catalog, mode, config.allow_holes);
        let mut cache = PseudoCache::new();
        let mut range = RangeState::from_heap(heap);
        let pass = catalog.pass_through();

        for stage in 0..self.stages {
            for p in self.pseudo.iter().filter(|p| p.stage == stage) {
                let count = value(p.var);
                if count == 0 {
                    continue;
                }
                let id = cache
                    .get_or_insert(work.solution.catalog_mut(), p.column, p.residue)
                    .map_err(|v| CompressionError::InvalidConfig(v.to_string()))?;
                for _ in 0..count {
                    range.apply_residue(p.column, p.residue);
                    work.commit(stage, Placement::new(id, p.column))?;
                }
            }
            for inst in self.instances.iter().filter(|i| i.stage == stage) {
                if inst.compressor == pass {
                    continue;
                }
                for _ in 0..value(inst.var) {
                    let placement = Placement::new(inst.compressor, inst.column)
                        .with_middle_width(inst.middle_width);
                    work.commit(stage, placement)?;
                }
            }
            work.carry_leftovers(stage);
        }

        let summary = match self.modulus {
            Some(m) => {
                log::debug!("exact: range {}", range);
                let summary = ModularSummary::new(m, &range);
                let decoded = self
                    .constant
                    .iter()
                    .enumerate()
                    .filter(|(_, z)| values[z.0] > 0)
                    .fold(0u64, |bits, (j, _)| bits | 1 << j);
                if decoded != summary.constant_bits {
                    return Err(CompressionError::Solver(format!(
                        "constant vector {:#b} disagrees with constant {}",
                        decoded, summary.constant
                    )));
                }
                Some(summary)
            }
            None => None,
        };
        let mut solution = work.finish(self.stages);
        if let Some(summary) = summary {
            solution.set_modular(summary);
        }
        Ok(solution)
    }
}
