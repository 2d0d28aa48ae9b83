/// Distance kept from the end of a stream so the final seek lands on a decodable frame
pub const END_MARGIN_SECS: f64 = 0.01;

/// Evenly spaced frame indices including both endpoints.
///
/// Index `i` is `i·(F−1)/(K−1)` rounded half-up, evaluated in integer arithmetic so the
/// result does not depend on floating point tie-breaking. Sources with no more than `target`
/// frames contribute every frame.
pub fn sample_indices(frame_count: usize, target: usize) -> Vec<usize> {
    if frame_count <= target {
        return (0..frame_count).collect();
    }
    if target == 0 {
        return Vec::new();
    }
    if target == 1 {
        return vec![0];
    }

    let span = frame_count - 1;
    let steps = target - 1;
    (0..target)
        .map(|i| (2 * i * span + steps) / (2 * steps))
        .collect()
}

/// Evenly spaced timestamps across `[0, duration]`, the last one pulled just inside the end
pub fn sample_timestamps(duration_secs: f64, target: usize) -> Vec<f64> {
    if target <= 1 {
        return vec![0.0];
    }

    let steps = (target - 1) as f64;
    let mut timestamps: Vec<f64> = (0..target)
        .map(|i| i as f64 * duration_secs / steps)
        .collect();
    if let Some(last) = timestamps.last_mut() {
        *last = last.min((duration_secs - END_MARGIN_SECS).max(0.0));
    }
    timestamps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_frame_count_uses_every_frame() {
        assert_eq!(sample_indices(5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn longer_sequences_are_spread_across_both_endpoints() {
        assert_eq!(sample_indices(12, 5), vec![0, 3, 6, 8, 11]);
    }

    #[test]
    fn short_sequences_use_all_frames() {
        assert_eq!(sample_indices(3, 5), vec![0, 1, 2]);
        assert!(sample_indices(0, 5).is_empty());
    }

    #[test]
    fn single_target_takes_first_frame() {
        assert_eq!(sample_indices(40, 1), vec![0]);
    }

    #[test]
    fn endpoint_property_holds_over_a_range_of_sizes() {
        for target in 2..8 {
            for frame_count in target..200 {
                let indices = sample_indices(frame_count, target);
                assert_eq!(indices.len(), target);
                assert_eq!(indices[0], 0);
                assert_eq!(*indices.last().unwrap(), frame_count - 1);
                assert!(indices.windows(2).all(|pair| pair[0] <= pair[1]));
            }
        }
    }

    #[test]
    fn timestamps_cover_duration_and_stop_short_of_the_end() {
        let timestamps = sample_timestamps(2.0, 5);
        assert_eq!(timestamps.len(), 5);
        assert_eq!(timestamps[0], 0.0);
        assert_eq!(timestamps[2], 1.0);
        assert!((timestamps[4] - (2.0 - END_MARGIN_SECS)).abs() < 1e-9);
    }

    #[test]
    fn tiny_durations_clamp_to_zero() {
        let timestamps = sample_timestamps(0.005, 3);
        assert_eq!(*timestamps.last().unwrap(), 0.0);
        assert_eq!(sample_timestamps(10.0, 1), vec![0.0]);
    }
}
