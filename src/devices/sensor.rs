use crate::devices::types::{Device, DeviceContext};

/// Duty-cycled sensor workload.
///
/// Within each period of `period_s` seconds the sensor sleeps, except for an
/// active window of `active_s` seconds starting at half the period. A flagged
/// event overrides the cycle with the high-load level.
#[derive(Debug, Clone)]
pub struct SensorLoad {
    /// Duty-cycle period (s).
    pub period_s: f64,

    /// Active window length within a period (s).
    pub active_s: f64,

    /// Sleep power (W).
    pub sleep_w: f64,

    /// Active power (W).
    pub active_w: f64,

    /// High-load power while an event is flagged (W).
    pub high_w: f64,
}

impl SensorLoad {
    /// Creates a sensor load from a milliwatt power profile.
    ///
    /// # Arguments
    ///
    /// * `period_s` - Duty-cycle period in seconds (must be > 0)
    /// * `active_s` - Active window in seconds (0 ≤ active ≤ period)
    /// * `sleep_mw` - Sleep power in mW
    /// * `active_mw` - Active power in mW
    /// * `high_mw` - High-load power in mW
    ///
    /// # Panics
    ///
    /// Panics if the period is not positive or the active window does not fit.
    pub fn from_milliwatts(
        period_s: f64,
        active_s: f64,
        sleep_mw: f64,
        active_mw: f64,
        high_mw: f64,
    ) -> Self {
        assert!(period_s > 0.0, "period must be > 0");
        assert!((0.0..=period_s).contains(&active_s));
        Self {
            period_s,
            active_s,
            sleep_w: sleep_mw / 1000.0,
            active_w: active_mw / 1000.0,
            high_w: high_mw / 1000.0,
        }
    }

    /// Power draw in watts for the given event flag and system time.
    pub fn power(&self, event: bool, system_time_s: f64) -> f64 {
        if event {
            return self.high_w;
        }
        let t_rel = system_time_s.rem_euclid(self.period_s);
        let start = self.period_s / 2.0;
        if start <= t_rel && t_rel < start + self.active_s {
            self.active_w
        } else {
            self.sleep_w
        }
    }

    /// Time-averaged draw over one quiet period (W).
    pub fn average_power_w(&self) -> f64 {
        (self.sleep_w * (self.period_s - self.active_s) + self.active_w * self.active_s)
            / self.period_s
    }
}

impl Device for SensorLoad {
    fn power_w(&self, context: &DeviceContext) -> f64 {
        self.power(context.event, context.system_time_s)
    }

    fn device_type(&self) -> &'static str {
        "SensorLoad"
    }
}
