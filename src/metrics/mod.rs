pub mod tracker;

pub use tracker::{MetricsTracker, TrainingMetrics};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histories_are_bounded() {
        let mut tracker = MetricsTracker::new(3);
        for i in 0..5 {
            tracker.record_loss(i as f32);
            tracker.record_episode(i as f32 * 10.0, i, 1.0, i);
        }
        assert_eq!(tracker.metrics().losses, vec![2.0, 3.0, 4.0]);
        assert_eq!(tracker.metrics().episode_lengths, vec![2, 3, 4]);
        assert_eq!(tracker.episode_count(), 5);
        assert_eq!(tracker.train_steps(), 5);
        assert_eq!(tracker.total_steps(), 10);
    }

    #[test]
    fn test_recent_averages() {
        let mut tracker = MetricsTracker::default();
        assert_eq!(tracker.avg_loss(10), None);
        tracker.record_episode(10.0, 1, 1.0, 0);
        tracker.record_episode(20.0, 1, 1.0, 3);
        tracker.record_episode(60.0, 1, 1.0, 1);
        assert_eq!(tracker.avg_episode_reward(2), Some(40.0));
        assert_eq!(tracker.avg_episode_reward(100), Some(30.0));
        assert_eq!(tracker.best_pipes_passed(), Some(3));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let mut tracker = MetricsTracker::new(10);
        tracker.record_loss(0.5);
        tracker.record_episode(12.0, 7, 0.9, 1);
        tracker.save(&path).unwrap();

        let mut restored = MetricsTracker::new(10);
        restored.load(&path).unwrap();
        assert_eq!(restored.metrics(), tracker.metrics());
    }
}
