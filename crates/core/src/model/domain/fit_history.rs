/// Metrics recorded at the end of one epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochMetrics {
    pub loss: f32,
    pub acc: f32,
    pub val_loss: f32,
    pub val_acc: f32,
}

/// Per-epoch metrics of one fit call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitHistory {
    pub loss: Vec<f32>,
    pub acc: Vec<f32>,
    pub val_loss: Vec<f32>,
    pub val_acc: Vec<f32>,
}

impl FitHistory {
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.loss.push(metrics.loss);
        self.acc.push(metrics.acc);
        self.val_loss.push(metrics.val_loss);
        self.val_acc.push(metrics.val_acc);
    }

    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn best_val_loss(&self) -> Option<f32> {
        self.val_loss
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f32::min)
    }

    pub fn best_val_acc(&self) -> Option<f32> {
        self.val_acc
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metrics(val_loss: f32, val_acc: f32) -> EpochMetrics {
        EpochMetrics {
            loss: 0.0,
            acc: 0.0,
            val_loss,
            val_acc,
        }
    }

    #[test]
    fn test_best_values_are_min_loss_and_max_acc() {
        let mut history = FitHistory::default();
        history.push(metrics(0.7, 0.5));
        history.push(metrics(0.4, 0.8));
        history.push(metrics(0.6, 0.7));
        assert_eq!(history.epochs(), 3);
        assert_relative_eq!(history.best_val_loss().unwrap(), 0.4);
        assert_relative_eq!(history.best_val_acc().unwrap(), 0.8);
    }

    #[test]
    fn test_empty_history_has_no_best() {
        let history = FitHistory::default();
        assert!(history.best_val_loss().is_none());
        assert!(history.best_val_acc().is_none());
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut history = FitHistory::default();
        history.push(metrics(f32::NAN, 0.1));
        history.push(metrics(0.9, f32::NAN));
        assert_relative_eq!(history.best_val_loss().unwrap(), 0.9);
        assert_relative_eq!(history.best_val_acc().unwrap(), 0.1);
    }
}
