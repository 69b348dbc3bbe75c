//! Synthetic input series: daily irradiance and per-node event flags.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use rand::{Rng, rngs::StdRng};

use crate::network::NodeId;
use crate::sim::clock::Clock;

/// Raised-cosine daylight profile with random cloud occlusion.
///
/// Irradiance peaks at noon and is zero outside `(sunrise_hour, sunset_hour)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarProfile {
    /// Clear-sky irradiance at noon (W/m²).
    pub peak_irradiance: f64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    /// Chance that any one sample is fully occluded.
    pub cloud_probability: f64,
}

impl Default for SolarProfile {
    fn default() -> Self {
        Self {
            peak_irradiance: 1000.0,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
            cloud_probability: 0.1,
        }
    }
}

impl SolarProfile {
    /// Clear-sky irradiance at `hour` (W/m²).
    pub fn clear_sky(&self, hour: f64) -> f64 {
        if self.sunrise_hour < hour && hour < self.sunset_hour {
            let day_length = self.sunset_hour - self.sunrise_hour;
            self.peak_irradiance * (1.0 + (TAU / day_length * (hour - 12.0)).cos()) / 2.0
        } else {
            0.0
        }
    }
}

/// Irradiance at `hour`, zeroed when a cloud is drawn.
///
/// Exactly one number is drawn from `rng` per call, day or night.
pub fn irradiance_at(profile: &SolarProfile, hour: f64, rng: &mut StdRng) -> f64 {
    let clouded = rng.random::<f64>() < profile.cloud_probability;
    if clouded {
        0.0
    } else {
        profile.clear_sky(hour)
    }
}

/// One irradiance sample per step, starting at midnight.
pub fn irradiance_series(
    profile: &SolarProfile,
    dt_s: f64,
    num_steps: usize,
    rng: &mut StdRng,
) -> Vec<f64> {
    let mut clock = Clock::new(num_steps, dt_s);
    let mut series = Vec::with_capacity(num_steps);
    while let Some(step) = clock.tick() {
        series.push(irradiance_at(profile, clock.hour_of_day(step), rng));
    }
    series
}

/// Bernoulli event flags for each node, generated in ascending id order.
pub fn event_series(
    nodes: &[NodeId],
    num_steps: usize,
    probability: f64,
    rng: &mut StdRng,
) -> BTreeMap<NodeId, Vec<bool>> {
    let mut ids = nodes.to_vec();
    ids.sort();
    ids.into_iter()
        .map(|id| {
            let flags = (0..num_steps)
                .map(|_| rng.random::<f64>() < probability)
                .collect();
            (id, flags)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn clear_sky_peaks_at_noon() {
        let p = SolarProfile::default();
        assert!((p.clear_sky(12.0) - 1000.0).abs() < 1e-9);
        assert!((p.clear_sky(9.0) - 500.0).abs() < 1e-9);
        assert_eq!(p.clear_sky(6.0), 0.0);
        assert_eq!(p.clear_sky(18.0), 0.0);
        assert_eq!(p.clear_sky(2.0), 0.0);
    }

    #[test]
    fn certain_cloud_blocks_everything() {
        let p = SolarProfile {
            cloud_probability: 1.0,
            ..SolarProfile::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(irradiance_at(&p, 12.0, &mut rng), 0.0);
    }

    #[test]
    fn series_is_one_day_of_samples() {
        let p = SolarProfile {
            cloud_probability: 0.0,
            ..SolarProfile::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let s = irradiance_series(&p, 3600.0, 48, &mut rng);
        assert_eq!(s.len(), 48);
        assert_eq!(s[0], 0.0);
        assert!((s[12] - 1000.0).abs() < 1e-9);
        assert_eq!(s[12], s[36]);
    }

    #[test]
    fn series_is_reproducible_for_seed() {
        let p = SolarProfile::default();
        let a = irradiance_series(&p, 60.0, 1440, &mut StdRng::seed_from_u64(25));
        let b = irradiance_series(&p, 60.0, 1440, &mut StdRng::seed_from_u64(25));
        assert_eq!(a, b);
    }

    #[test]
    fn event_series_covers_every_node() {
        let mut rng = StdRng::seed_from_u64(42);
        let ev = event_series(&[NodeId(1), NodeId(0)], 1000, 0.2, &mut rng);
        assert_eq!(ev.len(), 2);
        for flags in ev.values() {
            assert_eq!(flags.len(), 1000);
            let hits = flags.iter().filter(|&&f| f).count();
            assert!(hits > 100 && hits < 300);
        }
    }

    #[test]
    fn event_series_extremes() {
        let mut rng = StdRng::seed_from_u64(42);
        let never = event_series(&[NodeId(0)], 50, 0.0, &mut rng);
        assert!(never[&NodeId(0)].iter().all(|&f| !f));
        let always = event_series(&[NodeId(0)], 50, 1.0, &mut rng);
        assert!(always[&NodeId(0)].iter().all(|&f| f));
    }
}
