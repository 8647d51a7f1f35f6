// Windowed data selector - Bounded, render-ready views over sample history
use crate::domain::telemetry::{Channel, SeriesData, TelemetrySample, TimePoint, TimeSeriesPoint};
use crate::domain::window::{WindowPolicy, WindowStrategy};

/// Reduce a series to what `policy` allows.
///
/// The result is chronological, never longer than `policy.count_limit()` or the
/// input, and every element is within the time window of the newest sample.
/// Out-of-order input (a backend clock stepping back) is sorted by time first.
pub fn select_window<T: TimePoint + Clone>(samples: &[T], policy: &WindowPolicy) -> Vec<T> {
    if !samples.is_sorted_by_key(|sample| sample.time_ms()) {
        let mut ordered = samples.to_vec();
        ordered.sort_by_key(|sample| sample.time_ms());
        return select_window(&ordered, policy);
    }

    let recent = within_time_window(samples, policy);

    match policy.strategy() {
        WindowStrategy::KeepAll => {
            let start = recent.len().saturating_sub(policy.count_limit());
            recent[start..].to_vec()
        }
        WindowStrategy::DecimateUniform => decimate_uniform(recent, policy.target_points()),
        WindowStrategy::DecimateLatestBiased => {
            decimate_latest_biased(recent, policy.target_points())
        }
    }
}

fn within_time_window<'a, T: TimePoint>(samples: &'a [T], policy: &WindowPolicy) -> &'a [T] {
    let (Some(window), Some(latest)) = (policy.time_window(), samples.last()) else {
        return samples;
    };

    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    let cutoff = latest.time_ms().saturating_sub(window_ms);
    let start = samples.partition_point(|sample| sample.time_ms() < cutoff);
    &samples[start..]
}

/// Evenly spaced picks, always keeping the first and last element.
pub fn decimate_uniform<T: Clone>(samples: &[T], target: usize) -> Vec<T> {
    let n = samples.len();
    if n <= target {
        return samples.to_vec();
    }
    match target {
        0 => Vec::new(),
        1 => samples[n - 1..].to_vec(),
        k => (0..k).map(|i| samples[i * (n - 1) / (k - 1)].clone()).collect(),
    }
}

/// Keeps the newest half of the target dense and thins the older prefix.
pub fn decimate_latest_biased<T: Clone>(samples: &[T], target: usize) -> Vec<T> {
    let n = samples.len();
    if n <= target {
        return samples.to_vec();
    }
    if target <= 1 {
        return decimate_uniform(samples, target);
    }

    let dense_tail = target / 2;
    let split = n - dense_tail;
    let mut selected = match target - dense_tail {
        1 => vec![samples[0].clone()],
        remainder => decimate_uniform(&samples[..split], remainder),
    };
    selected.extend_from_slice(&samples[split..]);
    selected
}

/// Chart points for one channel; samples without the channel are skipped.
pub fn channel_series(samples: &[TelemetrySample], channel: Channel) -> SeriesData {
    let points = samples
        .iter()
        .filter_map(|sample| {
            sample
                .channel(channel)
                .map(|value| TimeSeriesPoint::new(sample.time_ms(), value))
        })
        .collect();

    SeriesData::new(channel.as_str().to_string(), channel.title().to_string(), points)
}
