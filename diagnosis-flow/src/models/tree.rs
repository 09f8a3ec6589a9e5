//! Array-encoded binary decision tree shared by the forest and boosted models.
//!
//! Node `i` is a leaf when `children_left[i] < 0`. Internal nodes compare
//! `features[feature[i]]` against `threshold[i]`; children always have a larger index than
//! their parent, which `check` enforces so traversal terminates.

use serde::{Deserialize, Serialize};

/// Which side an equal feature value falls on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// `x <= threshold` goes left (CART convention)
    #[default]
    LessOrEqual,
    /// `x < threshold` goes left (gradient-boosting convention)
    LessThan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node payload: class counts for classification trees, `[weight]` for regression.
    pub value: Vec<Vec<f64>>,
    #[serde(default)]
    pub split: SplitRule,
}

impl DecisionTree {
    /// Single-leaf tree, mostly useful for fixtures.
    pub fn leaf(value: Vec<f64>) -> Self {
        Self {
            children_left: vec![-1],
            children_right: vec![-1],
            feature: vec![-2],
            threshold: vec![0.0],
            value: vec![value],
            split: SplitRule::LessOrEqual,
        }
    }

    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] < 0
    }

    /// Payload of the leaf `features` lands in.
    pub fn leaf_value(&self, features: &[f64]) -> &[f64] {
        let mut node = 0usize;
        // bounded by node count even for unchecked trees
        for _ in 0..self.node_count() {
            if self.is_leaf(node) {
                break;
            }
            let value = features
                .get(self.feature[node] as usize)
                .copied()
                .unwrap_or(0.0);
            let threshold = self.threshold[node];
            let go_left = match self.split {
                SplitRule::LessOrEqual => value <= threshold,
                SplitRule::LessThan => value < threshold,
            };
            node = if go_left {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.value[node]
    }

    pub fn check(&self, n_features: usize, payload_width: usize) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("empty tree".into());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err("node arrays have different lengths".into());
        }

        for node in 0..n {
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left < 0 {
                if self.value[node].len() != payload_width {
                    return Err(format!(
                        "leaf {node} carries {} values, expected {payload_width}",
                        self.value[node].len()
                    ));
                }
                continue;
            }
            for child in [left, right] {
                if child <= node as i64 || child as usize >= n {
                    return Err(format!("node {node} has invalid child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {node} splits on unknown feature {feature}"));
            }
        }
        Ok(())
    }
}
