//! Early stopping on the validation loss

/// Decision after observing an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// Keep training
    Continue,
    /// Patience exhausted
    Stop,
}

/// Tracks the best validation loss and the parameters that produced it.
///
/// An epoch improves when its loss is lower than the best one by more than
/// `min_delta`. After `patience` epochs without improvement the tracker asks
/// to stop; the best snapshot is always available for restoring.
#[derive(Debug, Clone)]
pub struct EarlyStopping<S: Clone> {
    patience: usize,
    min_delta: f64,
    best_loss: f64,
    best_epoch: Option<usize>,
    wait: usize,
    snapshot: Option<S>,
}

impl<S: Clone> EarlyStopping<S> {
    /// Create a tracker with the given patience
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            min_delta: 0.0,
            best_loss: f64::INFINITY,
            best_epoch: None,
            wait: 0,
            snapshot: None,
        }
    }

    /// Minimum decrease counted as an improvement
    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta.max(0.0);
        self
    }

    /// Record the loss of `epoch`; `state` is cloned only on improvement
    pub fn observe(&mut self, epoch: usize, loss: f64, state: &S) -> StopDecision {
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            self.snapshot = Some(state.clone());
            StopDecision::Continue
        } else {
            self.wait += 1;
            if self.wait >= self.patience {
                StopDecision::Stop
            } else {
                StopDecision::Continue
            }
        }
    }

    /// Lowest loss seen
    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Epoch of the lowest loss
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Epochs since the last improvement
    pub fn wait(&self) -> usize {
        self.wait
    }

    /// Take the best snapshot, if any epoch was observed
    pub fn into_best(self) -> Option<S> {
        self.snapshot
    }
}
