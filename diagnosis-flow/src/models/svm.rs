//! One-vs-one support-vector classifier with Platt-scaled pairwise probabilities.
//!
//! Each unordered class pair has its own binary machine over a shared pool of support
//! vectors. Hard labels come from pairwise voting; probabilities come from coupling the
//! pairwise Platt estimates (Wu, Lin & Weng, 2004), the method libsvm uses.

use serde::{Deserialize, Serialize};

use super::{Classifier, argmax};

const MIN_PAIR_PROB: f64 = 1e-7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: i32 },
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Kernel::Linear => dot(a, b),
            Kernel::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * sq).exp()
            }
            Kernel::Poly {
                gamma,
                coef0,
                degree,
            } => (gamma * dot(a, b) + coef0).powi(*degree),
            Kernel::Sigmoid { gamma, coef0 } => (gamma * dot(a, b) + coef0).tanh(),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Binary machine separating `positive` (decision > 0) from `negative`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseMachine {
    pub positive: usize,
    pub negative: usize,
    /// Indices into the classifier's support-vector pool.
    pub support: Vec<usize>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
    /// Platt sigmoid parameters.
    pub prob_a: f64,
    pub prob_b: f64,
}

impl PairwiseMachine {
    fn decision(&self, kernel_values: &[f64]) -> f64 {
        self.support
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, coef)| coef * kernel_values[*sv])
            .sum::<f64>()
            + self.intercept
    }

    /// Probability that the sample belongs to `positive` rather than `negative`.
    fn platt(&self, decision: f64) -> f64 {
        let f = decision * self.prob_a + self.prob_b;
        let p = if f >= 0.0 {
            (-f).exp() / (1.0 + (-f).exp())
        } else {
            1.0 / (1.0 + f.exp())
        };
        p.clamp(MIN_PAIR_PROB, 1.0 - MIN_PAIR_PROB)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    pub n_features: usize,
    pub n_classes: usize,
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub machines: Vec<PairwiseMachine>,
}

impl SupportVectorClassifier {
    fn decisions(&self, features: &[f64]) -> Vec<f64> {
        let kernel_values: Vec<f64> = self
            .support_vectors
            .iter()
            .map(|sv| self.kernel.eval(sv, features))
            .collect();
        self.machines
            .iter()
            .map(|machine| machine.decision(&kernel_values))
            .collect()
    }
}

/// Couples pairwise estimates `r[i][j] ~ P(i | i or j)` into one distribution.
fn couple_pairwise(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let mut p = vec![1.0 / k as f64; k];
    if k < 2 {
        return p;
    }

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;
    let mut qp = vec![0.0; k];
    for _ in 0..max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp.iter().map(|v| (v - pqp).abs()).fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}

impl Classifier for SupportVectorClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let k = self.n_classes;
        let mut r = vec![vec![0.0; k]; k];
        for (machine, decision) in self.machines.iter().zip(self.decisions(features)) {
            let p = machine.platt(decision);
            r[machine.positive][machine.negative] = p;
            r[machine.negative][machine.positive] = 1.0 - p;
        }
        couple_pairwise(&r)
    }

    /// Pairwise voting; a zero decision counts for the negative class.
    fn predict(&self, features: &[f64]) -> usize {
        let mut votes = vec![0.0; self.n_classes];
        for (machine, decision) in self.machines.iter().zip(self.decisions(features)) {
            let winner = if decision > 0.0 {
                machine.positive
            } else {
                machine.negative
            };
            votes[winner] += 1.0;
        }
        argmax(&votes)
    }

    fn check(&self) -> Result<(), String> {
        let k = self.n_classes;
        if k == 0 {
            return Err("no classes".into());
        }
        if self.support_vectors.iter().any(|sv| sv.len() != self.n_features) {
            return Err("support vector width differs from n_features".into());
        }
        if self.machines.len() != k * (k - 1) / 2 {
            return Err(format!(
                "{} classes need {} pairwise machines, found {}",
                k,
                k * (k - 1) / 2,
                self.machines.len()
            ));
        }

        let mut covered = vec![vec![false; k]; k];
        for machine in &self.machines {
            let (a, b) = (machine.positive, machine.negative);
            if a >= k || b >= k || a == b {
                return Err(format!("invalid class pair ({a}, {b})"));
            }
            if covered[a][b] {
                return Err(format!("duplicate machine for pair ({a}, {b})"));
            }
            covered[a][b] = true;
            covered[b][a] = true;
            if machine.support.len() != machine.dual_coef.len() {
                return Err(format!("pair ({a}, {b}) has mismatched coefficients"));
            }
            if machine.support.iter().any(|sv| *sv >= self.support_vectors.len()) {
                return Err(format!("pair ({a}, {b}) references a missing support vector"));
            }
        }
        Ok(())
    }
}
