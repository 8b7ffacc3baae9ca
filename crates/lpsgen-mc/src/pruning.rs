//! Summand pruning.
//!
//! A pruning tree is a trie over the values of a few selected process
//! parameters. Each node holds the summands whose guard is not already false
//! once the parameters on the path to that node are bound. Nodes are created
//! on first use and kept for the lifetime of the tree, so a state whose
//! pruning parameters were seen before costs one hash lookup per parameter.

use crate::model::Model;
use crate::state::State;
use ahash::RandomState;
use lpsgen_eval::{BinOp, Evaluator, Expr, Substitution, Value, VarIdx};
use std::collections::HashMap;
use std::sync::Arc;

/// How strongly `expr` constrains `var`: a conjunction sums its operands, a
/// disjunction averages its disjuncts and an equality with `var` on either
/// side scores 1.
pub fn selectivity(expr: &Expr, var: VarIdx) -> f64 {
    match expr {
        Expr::Binary {
            op: BinOp::And,
            left,
            right,
        } => selectivity(left, var) + selectivity(right, var),
        Expr::Binary { op: BinOp::Or, .. } => {
            let mut disjuncts = Vec::new();
            collect_disjuncts(expr, &mut disjuncts);
            let sum: f64 = disjuncts.iter().map(|d| selectivity(d, var)).sum();
            sum / disjuncts.len() as f64
        }
        Expr::Binary {
            op: BinOp::Eq,
            left,
            right,
        } => {
            let is_var = |e: &Expr| matches!(e, Expr::Var(v) if *v == var);
            if is_var(&**left) || is_var(&**right) {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn collect_disjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Binary {
            op: BinOp::Or,
            left,
            right,
        } => {
            collect_disjuncts(left, out);
            collect_disjuncts(right, out);
        }
        _ => out.push(expr),
    }
}

/// Process parameter positions with a positive total selectivity over the
/// given summands' guards, most selective first.
pub fn pruning_parameters(model: &Model, summands: &[usize]) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = model
        .params()
        .iter()
        .enumerate()
        .map(|(pos, p)| {
            let score = summands
                .iter()
                .map(|&i| selectivity(&model.summands()[i].condition, p.idx))
                .sum::<f64>();
            (pos, score)
        })
        .filter(|&(_, score)| score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().map(|(pos, _)| pos).collect()
}

#[derive(Debug)]
struct Node {
    summands: Arc<[usize]>,
    children: HashMap<Value, usize, RandomState>,
}

impl Node {
    fn new(summands: Arc<[usize]>) -> Self {
        Self {
            summands,
            children: HashMap::default(),
        }
    }
}

/// Append-only pruning trie. Nodes live in an arena and refer to their
/// children by index.
#[derive(Debug)]
pub struct PruningTree {
    params: Vec<usize>,
    nodes: Vec<Node>,
    sigma: Substitution,
}

impl PruningTree {
    pub fn new(model: &Model, summands: Arc<[usize]>) -> Self {
        let params = pruning_parameters(model, &summands);
        Self {
            params,
            nodes: vec![Node::new(summands)],
            sigma: Substitution::with_capacity(model.var_count()),
        }
    }

    /// Pruning parameter positions, in trie order.
    pub fn parameters(&self) -> &[usize] {
        &self.params
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Summands that may be enabled in `state`, ascending. Extends the trie
    /// along the state's pruning parameter values as needed.
    ///
    /// A guard that fails to evaluate under the partial binding is kept; the
    /// error surfaces when the summand is actually expanded.
    pub fn candidates<E: Evaluator>(
        &mut self,
        model: &Model,
        evaluator: &E,
        state: &State,
    ) -> Arc<[usize]> {
        self.sigma.clear();
        let mut node = 0;
        for depth in 0..self.params.len() {
            if self.nodes[node].summands.is_empty() {
                break;
            }
            let pos = self.params[depth];
            let value = state.get(pos);
            self.sigma.bind(model.params()[pos].idx, value.clone());

            let existing = self.nodes[node].children.get(value).copied();
            node = match existing {
                Some(child) => child,
                None => {
                    let sigma = &self.sigma;
                    let kept: Vec<usize> = self.nodes[node]
                        .summands
                        .iter()
                        .copied()
                        .filter(|&i| {
                            let guard = &model.summands()[i].condition;
                            !matches!(evaluator.partial(guard, sigma), Ok(Some(Value::Bool(false))))
                        })
                        .collect();
                    let child = self.nodes.len();
                    self.nodes.push(Node::new(kept.into()));
                    self.nodes[node].children.insert(value.clone(), child);
                    child
                }
            };
        }
        Arc::clone(&self.nodes[node].summands)
    }
}
