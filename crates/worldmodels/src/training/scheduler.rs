//! Reduce-on-plateau learning rate schedule.

use super::optimizer::LrControl;
use serde::{Deserialize, Serialize};

/// Whether lower or higher metric values count as improvement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateauMode {
    Min,
    Max,
}

/// Multiplies the learning rate by `factor` once the monitored metric has
/// failed to improve for more than `patience` consecutive steps.
///
/// Improvement is relative: in `Min` mode a value counts as better when it
/// is below `best * (1 - threshold)`. The rate never drops below `min_lr`.
#[derive(Clone, Debug)]
pub struct ReduceLROnPlateau {
    mode: PlateauMode,
    factor: f64,
    patience: usize,
    pub min_lr: f64,
    pub threshold: f64,
    best: Option<f64>,
    num_bad_epochs: usize,
    last_epoch: usize,
    lr: f64,
}

/// Reductions smaller than this are ignored.
const LR_EPS: f64 = 1e-8;

impl ReduceLROnPlateau {
    pub fn new(mode: PlateauMode, factor: f64, patience: usize) -> Self {
        Self {
            mode,
            factor,
            patience,
            min_lr: 0.0,
            threshold: 1e-4,
            best: None,
            num_bad_epochs: 0,
            last_epoch: 0,
            lr: 0.0,
        }
    }

    /// Set the learning rate floor
    pub fn min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }

    /// Set the relative improvement threshold
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn is_better(&self, metric: f64, best: f64) -> bool {
        match self.mode {
            PlateauMode::Min => metric < best * (1.0 - self.threshold),
            PlateauMode::Max => metric > best * (1.0 + self.threshold),
        }
    }

    /// Advance one epoch without a metric.
    pub fn step<O: LrControl>(&mut self, optimizer: &mut O) {
        self.last_epoch += 1;
        self.lr = optimizer.lr();
    }

    /// Advance one epoch with the monitored metric.
    ///
    /// Returns `true` if the learning rate was reduced.
    pub fn step_with_metric<O: LrControl>(&mut self, optimizer: &mut O, metric: f64) -> bool {
        self.last_epoch += 1;
        self.lr = optimizer.lr();

        match self.best {
            Some(best) if !self.is_better(metric, best) => self.num_bad_epochs += 1,
            _ => {
                self.best = Some(metric);
                self.num_bad_epochs = 0;
            }
        }

        if self.num_bad_epochs <= self.patience {
            return false;
        }
        self.num_bad_epochs = 0;

        let new_lr = (self.lr * self.factor).max(self.min_lr);
        if self.lr - new_lr <= LR_EPS {
            return false;
        }

        optimizer.set_lr(new_lr);
        self.lr = new_lr;
        true
    }

    /// Learning rate seen at the last step (0.0 before the first).
    pub fn get_lr(&self) -> f64 {
        self.lr
    }

    pub fn last_epoch(&self) -> usize {
        self.last_epoch
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockOptimizer {
        lr: f64,
    }

    impl MockOptimizer {
        fn new(lr: f64) -> Self {
            Self { lr }
        }
    }

    impl LrControl for MockOptimizer {
        fn lr(&self) -> f64 {
            self.lr
        }

        fn set_lr(&mut self, lr: f64) {
            self.lr = lr;
        }
    }

    #[test]
    fn test_reduce_on_plateau() {
        let mut optimizer = MockOptimizer::new(0.1);
        let mut scheduler = ReduceLROnPlateau::new(PlateauMode::Min, 0.1, 3);

        // Improving
        scheduler.step_with_metric(&mut optimizer, 1.0);
        scheduler.step_with_metric(&mut optimizer, 0.9);
        assert!((optimizer.lr() - 0.1).abs() < 1e-12);

        // Three bad epochs are still within patience
        for _ in 0..3 {
            assert!(!scheduler.step_with_metric(&mut optimizer, 0.9));
        }
        assert!((optimizer.lr() - 0.1).abs() < 1e-12);

        // The fourth exceeds it
        assert!(scheduler.step_with_metric(&mut optimizer, 0.9));
        assert!((optimizer.lr() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_reduce_on_plateau_max_mode() {
        let mut optimizer = MockOptimizer::new(0.1);
        let mut scheduler = ReduceLROnPlateau::new(PlateauMode::Max, 0.5, 1);

        scheduler.step_with_metric(&mut optimizer, 0.5);
        scheduler.step_with_metric(&mut optimizer, 0.6);
        assert!((optimizer.lr() - 0.1).abs() < 1e-12);

        scheduler.step_with_metric(&mut optimizer, 0.6);
        scheduler.step_with_metric(&mut optimizer, 0.6);
        assert!((optimizer.lr() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_improvement_resets_patience() {
        let mut optimizer = MockOptimizer::new(1.0);
        let mut scheduler = ReduceLROnPlateau::new(PlateauMode::Min, 0.5, 1);

        scheduler.step_with_metric(&mut optimizer, 10.0);
        scheduler.step_with_metric(&mut optimizer, 10.0);
        scheduler.step_with_metric(&mut optimizer, 9.0);
        scheduler.step_with_metric(&mut optimizer, 9.0);
        assert_eq!(optimizer.lr(), 1.0);
        assert_eq!(scheduler.best(), Some(9.0));
    }

    #[test]
    fn test_threshold_ignores_tiny_improvements() {
        let mut optimizer = MockOptimizer::new(1.0);
        let mut scheduler = ReduceLROnPlateau::new(PlateauMode::Min, 0.5, 0).threshold(0.01);

        scheduler.step_with_metric(&mut optimizer, 100.0);
        // 99.5 is less than a 1% improvement
        assert!(scheduler.step_with_metric(&mut optimizer, 99.5));
        assert_eq!(optimizer.lr(), 0.5);
    }

    #[test]
    fn test_min_lr_clamp() {
        let mut optimizer = MockOptimizer::new(0.001);
        let mut scheduler = ReduceLROnPlateau::new(PlateauMode::Min, 0.1, 0).min_lr(0.0005);

        scheduler.step_with_metric(&mut optimizer, 1.0);
        assert!(scheduler.step_with_metric(&mut optimizer, 1.0));
        assert!((optimizer.lr() - 0.0005).abs() < 1e-12);

        // Already at the floor: no further reduction
        assert!(!scheduler.step_with_metric(&mut optimizer, 1.0));
        assert!((scheduler.get_lr() - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn test_step_without_metric() {
        let mut optimizer = MockOptimizer::new(0.1);
        let mut scheduler = ReduceLROnPlateau::new(PlateauMode::Min, 0.1, 2);
        assert_eq!(scheduler.get_lr(), 0.0);

        scheduler.step(&mut optimizer);
        scheduler.step(&mut optimizer);
        assert_eq!(scheduler.last_epoch(), 2);
        assert_eq!(scheduler.get_lr(), 0.1);
    }
}
