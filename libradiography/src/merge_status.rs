/// Which half of a merge a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePhase {
    #[default]
    Reading,
    Writing,
}

/// Progress message sent by the merger over an mpsc channel.
///
/// `progress` is the completed fraction of the current phase, in [0, 1].
#[derive(Debug, Clone, Default)]
pub struct MergeStatus {
    pub progress: f32,
    pub phase: MergePhase,
}

impl MergeStatus {
    pub fn new(progress: f32, phase: MergePhase) -> Self {
        Self { progress, phase }
    }

    /// Status after `done` of `total` items of a phase. An empty phase counts as complete.
    pub fn fraction(done: usize, total: usize, phase: MergePhase) -> Self {
        let progress = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        Self::new(progress, phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_phase_is_complete() {
        let status = MergeStatus::fraction(0, 0, MergePhase::Writing);
        assert_eq!(status.progress, 1.0);
        assert_eq!(status.phase, MergePhase::Writing);
    }

    #[test]
    fn fraction_of_files() {
        let status = MergeStatus::fraction(1, 4, MergePhase::Reading);
        assert!((status.progress - 0.25).abs() < f32::EPSILON);
    }
}
