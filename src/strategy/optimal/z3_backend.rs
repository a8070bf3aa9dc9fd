//! z3 optimizer backend

use crate::error::CompressionError;
use crate::strategy::optimal::backend::{IlpBackend, SolveOutcome};
use crate::strategy::optimal::model::{IlpModel, Relation, VarId};
use std::time::Duration;
use z3::ast::{Ast, Int};
use z3::{Config, Context, Optimize, Params, SatResult};

/// Solves models with the z3 optimizer, one fresh context per call
#[derive(Debug, Default)]
pub struct Z3Backend;

impl Z3Backend {
    pub fn new() -> Self {
        Self
    }
}

impl IlpBackend for Z3Backend {
    fn name(&self) -> &str {
        "z3"
    }

    fn solve(
        &mut self,
        model: &IlpModel,
        timeout: Option<Duration>,
    ) -> Result<SolveOutcome, CompressionError> {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let opt = Optimize::new(&ctx);
        if let Some(timeout) = timeout {
            let mut params = Params::new(&ctx);
            params.set_u32("timeout", timeout.as_millis().min(u32::MAX as u128) as u32);
            opt.set_params(&params);
        }

        let vars: Vec<Int> = model
            .variables()
            .iter()
            .map(|v| {
                let x = Int::new_const(&ctx, v.name.clone());
                opt.assert(&x.ge(&Int::from_i64(&ctx, v.lower)));
                if let Some(upper) = v.upper {
                    opt.assert(&x.le(&Int::from_i64(&ctx, upper)));
                }
                x
            })
            .collect();

        let linear = |terms: &[(VarId, i64)]| -> Int {
            let products: Vec<Int> = terms
                .iter()
                .map(|&(v, c)| Int::mul(&ctx, &[&Int::from_i64(&ctx, c), &vars[v.0]]))
                .collect();
            if products.is_empty() {
                Int::from_i64(&ctx, 0)
            } else {
                Int::add(&ctx, &products.iter().collect::<Vec<_>>())
            }
        };

        for c in model.constraints() {
            let lhs = linear(&c.terms);
            let rhs = Int::from_i64(&ctx, c.rhs);
            let assertion = match c.relation {
                Relation::Le => lhs.le(&rhs),
                Relation::Ge => lhs.ge(&rhs),
                Relation::Eq => lhs._eq(&rhs),
            };
            opt.assert(&assertion);
        }
        let objective = linear(model.objective());
        opt.minimize(&objective);

        log::debug!(
            "z3: solving {} variables, {} constraints",
            vars.len(),
            model.constraints().len()
        );
        match opt.check(&[]) {
            SatResult::Unsat => Ok(SolveOutcome::Infeasible),
            SatResult::Unknown => Ok(SolveOutcome::Unknown(
                "z3 returned unknown".to_string(),
            )),
            SatResult::Sat => {
                let z3_model = opt
                    .get_model()
                    .ok_or_else(|| CompressionError::Solver("no model after sat".to_string()))?;
                let values = vars
                    .iter()
                    .map(|x| {
                        z3_model
                            .eval(x, true)
                            .and_then(|v| v.as_i64())
                            .ok_or_else(|| {
                                CompressionError::Solver("unreadable model value".to_string())
                            })
                    })
                    .collect::<Result<Vec<i64>, _>>()?;
                let objective = model.objective_value(&values);
                Ok(SolveOutcome::Optimal { values, objective })
            }
        }
    }
}
