//! Histogram-binned CART regression tree.
//!
//! Split search bins each feature into equal-width buckets over the training
//! range and scans cumulative count/sum/sum-of-squares to find the split that
//! minimizes the summed squared error of both children.

use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of histogram bins used for split search.
    pub bins: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            bins: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature_index: usize,
        /// Rows with `feature <= threshold` go left.
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree on the rows listed in `rows` (duplicates allowed).
    ///
    /// Squared-error reductions of every split are added to `importance`,
    /// indexed by feature.
    pub fn fit(
        data: &BinnedMatrix,
        y: &[f64],
        rows: &[usize],
        options: &TreeOptions,
        importance: &mut [f64],
    ) -> Result<Self, String> {
        if rows.is_empty() {
            return Err("Cannot fit a tree on zero rows".to_string());
        }
        if y.len() != data.codes.len() {
            return Err("Mismatched X/Y lengths".to_string());
        }
        let mut builder = TreeBuilder {
            data,
            y,
            options,
            importance,
            nodes: Vec::new(),
        };
        builder.grow(rows.to_vec(), 0);
        Ok(Self {
            nodes: builder.nodes,
        })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = features.get(*feature_index).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Check that child links point forward inside the node list.
    pub fn validate(&self, feature_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature_index,
                left,
                right,
                ..
            } = node
            {
                if *feature_index >= feature_len {
                    return Err(format!(
                        "Node {idx} splits on feature {feature_index} but only {feature_len} exist"
                    ));
                }
                let len = self.nodes.len();
                if *left <= idx || *right <= idx || *left >= len || *right >= len {
                    return Err(format!("Node {idx} has invalid child links"));
                }
            }
        }
        Ok(())
    }
}

/// Training matrix with per-feature bin codes precomputed.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    pub mins: Vec<f64>,
    pub maxs: Vec<f64>,
    pub bins: usize,
    /// Row-major bin codes aligned with the input rows.
    pub codes: Vec<Vec<u8>>,
}

impl BinnedMatrix {
    pub fn new(x: &[Vec<f64>], bins: usize) -> Self {
        let bins = bins.clamp(2, 256);
        let feature_len = x.first().map(Vec::len).unwrap_or(0);
        let (mins, maxs) = feature_min_max(x, feature_len);
        let codes = x
            .iter()
            .map(|row| {
                (0..feature_len)
                    .map(|j| bin_code(row.get(j).copied().unwrap_or(0.0), mins[j], maxs[j], bins))
                    .collect()
            })
            .collect();
        Self {
            mins,
            maxs,
            bins,
            codes,
        }
    }

    pub fn feature_len(&self) -> usize {
        self.mins.len()
    }

    /// Upper edge of `split_bin`; every value coded `<= split_bin` is `<=` this.
    fn threshold_for_bin(&self, feature_idx: usize, split_bin: usize) -> f64 {
        let (min, max) = (self.mins[feature_idx], self.maxs[feature_idx]);
        min + (split_bin + 1) as f64 / self.bins as f64 * (max - min)
    }
}

fn feature_min_max(x: &[Vec<f64>], feature_len: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mins = vec![f64::INFINITY; feature_len];
    let mut maxs = vec![f64::NEG_INFINITY; feature_len];
    for row in x {
        for (j, &v) in row.iter().take(feature_len).enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    for j in 0..feature_len {
        if !mins[j].is_finite() || !maxs[j].is_finite() {
            mins[j] = 0.0;
            maxs[j] = 0.0;
        }
        if mins[j] == maxs[j] {
            maxs[j] = mins[j] + 1.0;
        }
    }
    (mins, maxs)
}

/// Smallest bin whose upper edge is at or above `v`.
fn bin_code(v: f64, min: f64, max: f64, bins: usize) -> u8 {
    let t = ((v - min) / (max - min)).clamp(0.0, 1.0);
    let code = (t * bins as f64).ceil() as usize;
    code.saturating_sub(1).min(bins - 1) as u8
}

struct TreeBuilder<'a> {
    data: &'a BinnedMatrix,
    y: &'a [f64],
    options: &'a TreeOptions,
    importance: &'a mut [f64],
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    sse: f64,
    feature_index: usize,
    split_bin: usize,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let v = self.y[i];
            (s + v, sq + v * v)
        });
        let n = rows.len() as f64;
        let value = sum / n;
        self.nodes.push(Node::Leaf { value });

        if depth >= self.options.max_depth
            || rows.len() < self.options.min_samples_split.max(2)
        {
            return idx;
        }
        let parent_sse = (sum_sq - sum * sum / n).max(0.0);
        let Some(best) = self.best_split(&rows) else {
            return idx;
        };
        let gain = parent_sse - best.sse;
        if gain <= 1e-12 {
            return idx;
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| (self.data.codes[i][best.feature_index] as usize) <= best.split_bin);
        if let Some(slot) = self.importance.get_mut(best.feature_index) {
            *slot += gain;
        }
        let threshold = self.data.threshold_for_bin(best.feature_index, best.split_bin);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature_index: best.feature_index,
            threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize]) -> Option<BestSplit> {
        let mut best: Option<BestSplit> = None;
        for feature_idx in 0..self.data.feature_len() {
            if let Some(split) = self.best_split_for_feature(rows, feature_idx)
                && best.is_none_or(|b| split.sse < b.sse)
            {
                best = Some(split);
            }
        }
        best
    }

    fn best_split_for_feature(&self, rows: &[usize], feature_idx: usize) -> Option<BestSplit> {
        let bins = self.data.bins;
        let mut counts = vec![0usize; bins];
        let mut sums = vec![0f64; bins];
        let mut sums_sq = vec![0f64; bins];
        for &i in rows {
            let b = self.data.codes[i][feature_idx] as usize;
            let r = self.y[i];
            counts[b] += 1;
            sums[b] += r;
            sums_sq[b] += r * r;
        }
        let total_count = rows.len();
        let total_sum: f64 = sums.iter().sum();
        let total_sum_sq: f64 = sums_sq.iter().sum();
        let min_leaf = self.options.min_samples_leaf.max(1);

        let mut best: Option<BestSplit> = None;
        let mut left_count = 0usize;
        let mut left_sum = 0f64;
        let mut left_sum_sq = 0f64;
        for split_bin in 0..(bins - 1) {
            left_count += counts[split_bin];
            left_sum += sums[split_bin];
            left_sum_sq += sums_sq[split_bin];
            let right_count = total_count - left_count;
            if counts[split_bin] == 0 || left_count < min_leaf || right_count < min_leaf {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sum_sq = total_sum_sq - left_sum_sq;
            let left_sse = left_sum_sq - (left_sum * left_sum) / left_count as f64;
            let right_sse = right_sum_sq - (right_sum * right_sum) / right_count as f64;
            let sse = left_sse + right_sse;
            if best.is_none_or(|b| sse < b.sse) {
                best = Some(BestSplit {
                    sse,
                    feature_index: feature_idx,
                    split_bin,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let y = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        (x, y)
    }

    #[test]
    fn learns_a_step_function() {
        let (x, y) = step_data();
        let data = BinnedMatrix::new(&x, 32);
        let rows: Vec<usize> = (0..x.len()).collect();
        let mut importance = vec![0.0; 2];
        let tree = RegressionTree::fit(&data, &y, &rows, &TreeOptions::default(), &mut importance)
            .unwrap();
        assert!((tree.predict(&[2.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!((tree.predict(&[17.0, 0.0]) - 5.0).abs() < 1e-12);
        assert!(importance[0] > 0.0);
        assert_eq!(importance[1], 0.0);
        tree.validate(2).unwrap();
    }

    #[test]
    fn depth_zero_yields_mean_leaf() {
        let (x, y) = step_data();
        let data = BinnedMatrix::new(&x, 32);
        let rows: Vec<usize> = (0..x.len()).collect();
        let options = TreeOptions {
            max_depth: 0,
            ..TreeOptions::default()
        };
        let tree = RegressionTree::fit(&data, &y, &rows, &options, &mut [0.0, 0.0]).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert!((tree.predict(&[0.0, 0.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn min_leaf_blocks_tiny_children() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = vec![0.0, 0.0, 9.0];
        let data = BinnedMatrix::new(&x, 8);
        let options = TreeOptions {
            min_samples_split: 2,
            min_samples_leaf: 2,
            ..TreeOptions::default()
        };
        let tree = RegressionTree::fit(&data, &y, &[0, 1, 2], &options, &mut [0.0]).unwrap();
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn bin_codes_agree_with_thresholds() {
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64 * 0.37]).collect();
        let data = BinnedMatrix::new(&x, 16);
        for (row, codes) in x.iter().zip(&data.codes) {
            let code = codes[0] as usize;
            assert!(row[0] <= data.threshold_for_bin(0, code) + 1e-9);
            if code > 0 {
                assert!(row[0] > data.threshold_for_bin(0, code - 1) - 1e-9);
            }
        }
    }
}
