//! Shuffled k-fold splitting and cooperative cancellation for training runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

/// Why a training run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("training was cancelled")]
    Cancelled,
    #[error("training exceeded its deadline")]
    DeadlineExceeded,
}

/// Deadline and cancel flag checked between folds and model families.
#[derive(Debug, Clone, Default)]
pub struct TrainControl {
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl TrainControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancel: Arc::default(),
        }
    }

    /// Shared flag; storing `true` cancels the run at the next checkpoint.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Interrupted::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }
}

/// K-fold splitter over shuffled row indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// `(train, test)` index pairs; the first `n % k` folds get one extra row.
    ///
    /// Empty when fewer than two folds are possible.
    pub fn splits(&self, n: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let k = self.n_splits;
        if k < 2 || n < k {
            return Vec::new();
        }
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let base = n / k;
        let extra = n % k;
        let mut out = Vec::with_capacity(k);
        let mut start = 0usize;
        for fold in 0..k {
            let len = base + usize::from(fold < extra);
            let test = indices[start..start + len].to_vec();
            let train = indices[..start]
                .iter()
                .chain(&indices[start + len..])
                .copied()
                .collect();
            out.push((train, test));
            start += len;
        }
        out
    }
}

/// Fold count used for `n` samples: `min(cap, n - 1)`.
pub fn fold_count(n: usize, cap: usize) -> usize {
    cap.min(n.saturating_sub(1))
}

pub(crate) fn take_rows<T: Clone>(values: &[T], idx: &[usize]) -> Vec<T> {
    idx.iter().map(|&i| values[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_partition_all_rows() {
        let splits = KFold::new(3, 7).splits(10);
        assert_eq!(splits.len(), 3);
        let sizes: Vec<usize> = splits.iter().map(|(_, test)| test.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        let mut seen: Vec<usize> = splits.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        for (train, test) in &splits {
            assert_eq!(train.len() + test.len(), 10);
            assert!(test.iter().all(|i| !train.contains(i)));
        }
    }

    #[test]
    fn splitting_is_seeded() {
        assert_eq!(KFold::new(4, 1).splits(12), KFold::new(4, 1).splits(12));
    }

    #[test]
    fn too_few_rows_or_folds_gives_nothing() {
        assert!(KFold::new(1, 0).splits(10).is_empty());
        assert!(KFold::new(5, 0).splits(3).is_empty());
        assert_eq!(fold_count(2, 5), 1);
        assert_eq!(fold_count(30, 5), 5);
        assert_eq!(fold_count(0, 5), 0);
    }

    #[test]
    fn control_reports_cancel_and_deadline() {
        let control = TrainControl::new();
        assert_eq!(control.check(), Ok(()));
        control.cancel_flag().store(true, Ordering::Relaxed);
        assert_eq!(control.check(), Err(Interrupted::Cancelled));
        let expired = TrainControl::with_timeout(Duration::ZERO);
        assert_eq!(expired.check(), Err(Interrupted::DeadlineExceeded));
    }
}
