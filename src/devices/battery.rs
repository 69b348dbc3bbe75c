use tracing::{debug, trace};

use crate::devices::types::{BatteryState, StorageDevice};

/// Capacity loss at which the battery reaches end of life.
pub const END_OF_LIFE_QLOSS: f64 = 0.90;
/// SOC at or above which the battery is treated as full.
pub const FULL_SOC: f64 = 0.99;
/// SOC at or below which the battery is treated as empty.
pub const EMPTY_SOC: f64 = 0.10;

/// Seven-parameter open-circuit-voltage curve over depth of discharge.
///
/// With `x = 1 - soc`:
/// `V = p0·(1 - p1·x / (1 - p2·x)) + p3·(1 - p4·x / (1 + p5·x)) + p6`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcvCurve(pub [f64; 7]);

impl OcvCurve {
    /// Fitted charging curve of the reference Li-ion cell.
    pub const CHARGE: OcvCurve = OcvCurve([
        0.832784949290123,
        0.00950742937440156,
        0.986933683934508,
        1.91017763008209,
        0.366569502392137,
        1.00215219026646,
        1.57676233212954,
    ]);

    /// Fitted discharging curve of the reference Li-ion cell.
    pub const DISCHARGE: OcvCurve = OcvCurve([
        0.476542280050523,
        0.0531424828486832,
        0.968130028634588,
        2.09592651158253,
        1.35223313396928,
        4.34427534146120,
        1.48772171109281,
    ]);

    /// Open-circuit voltage (V) at the given state of charge.
    pub fn voltage(&self, soc: f64) -> f64 {
        let p = &self.0;
        let x = 1.0 - soc;
        p[0] * (1.0 - p[1] * x / (1.0 - p[2] * x)) + p[3] * (1.0 - p[4] * x / (1.0 + p[5] * x)) + p[6]
    }
}

/// Semi-empirical cycle-life model parameters.
///
/// Per step, `dQloss = Ahr·z·exp(b/z)·Qloss^((z-1)/z)` with
/// `b = b1·C + b0` for C-rate `C` and `Ahr = |ΔAh / A0|·ar`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeModel {
    pub z: f64,
    pub b1: f64,
    pub b0: f64,
    pub ar: f64,
}

impl Default for FadeModel {
    fn default() -> Self {
        Self {
            z: 0.430348812891015,
            b1: 1.0519,
            b0: -5.6896,
            ar: 0.0088,
        }
    }
}

impl FadeModel {
    /// Capacity-loss increment for one step. Always non-negative.
    fn increment(&self, qloss: f64, current_a: f64, delta_ah: f64, capacity_ah: f64) -> f64 {
        let ahr = (delta_ah / capacity_ah * self.ar).abs();
        if ahr == 0.0 {
            return 0.0;
        }
        let c_rate = (current_a / capacity_ah).abs();
        let b = self.b1 * c_rate + self.b0;
        ahr * self.z * (b / self.z).exp() * qloss.powf((self.z - 1.0) / self.z)
    }
}

/// A lithium-ion battery with capacity fade.
///
/// `Qloss` only ever grows, and `Dead` (end of life) is absorbing.
///
/// # Power Convention
/// - Positive power: discharging
/// - Negative power: charging
#[derive(Debug, Clone)]
pub struct Battery {
    /// Nominal capacity (Ah).
    pub capacity_ah: f64,

    /// Internal resistance (Ω).
    pub resistance_ohm: f64,

    pub charge_curve: OcvCurve,
    pub discharge_curve: OcvCurve,
    pub fade: FadeModel,

    soc: f64,
    voc: f64,
    current_a: f64,
    qloss: f64,
    state: BatteryState,
    depleted: bool,
    last_power_w: f64,
}

impl Battery {
    /// Creates a battery at 75% SOC with 1% initial capacity loss.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is not positive.
    pub fn new(capacity_ah: f64) -> Self {
        assert!(capacity_ah > 0.0, "capacity must be > 0");
        let mut battery = Self {
            capacity_ah,
            resistance_ohm: 0.46,
            charge_curve: OcvCurve::CHARGE,
            discharge_curve: OcvCurve::DISCHARGE,
            fade: FadeModel::default(),
            soc: 0.75,
            voc: 0.0,
            current_a: 0.0,
            qloss: 0.01,
            state: BatteryState::Normal,
            depleted: false,
            last_power_w: 0.0,
        };
        battery.voc = battery.discharge_curve.voltage(battery.soc);
        battery.classify();
        battery
    }

    /// Sets the state of charge and re-derives voltage and state.
    ///
    /// # Panics
    ///
    /// Panics if `soc` is outside `[0, 1]`.
    pub fn with_soc(mut self, soc: f64) -> Self {
        assert!((0.0..=1.0).contains(&soc));
        self.soc = soc;
        self.voc = self.discharge_curve.voltage(soc);
        self.classify();
        self
    }

    /// Sets the accumulated capacity loss.
    ///
    /// # Panics
    ///
    /// Panics if `qloss` is outside `(0, 1)`; the fade law is singular at zero.
    pub fn with_qloss(mut self, qloss: f64) -> Self {
        assert!(qloss > 0.0 && qloss < 1.0);
        self.qloss = qloss;
        self.classify();
        self
    }

    /// Sets the internal resistance.
    pub fn with_resistance(mut self, resistance_ohm: f64) -> Self {
        assert!(resistance_ohm > 0.0);
        self.resistance_ohm = resistance_ohm;
        self
    }

    pub fn soc(&self) -> f64 {
        self.soc
    }

    pub fn voc(&self) -> f64 {
        self.voc
    }

    /// Current of the last update (A); negative while discharging.
    pub fn current_a(&self) -> f64 {
        self.current_a
    }

    pub fn qloss(&self) -> f64 {
        self.qloss
    }

    pub fn state(&self) -> BatteryState {
        self.state
    }

    /// Whether a discharge was ever requested while empty or dead.
    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    /// Power most recently requested from the battery (W).
    pub fn last_power_w(&self) -> f64 {
        self.last_power_w
    }

    /// Applies `power_w` for `dt_s` seconds.
    pub fn update(&mut self, power_w: f64, dt_s: f64) {
        self.last_power_w = power_w;

        if power_w > 0.0 && matches!(self.state, BatteryState::Dead | BatteryState::Empty) {
            self.current_a = 0.0;
            if !self.depleted {
                debug!(soc = self.soc, state = ?self.state, "battery depleted");
            }
            self.depleted = true;
            return;
        }
        if power_w < 0.0 && self.state == BatteryState::Full {
            self.current_a = 0.0;
            return;
        }
        if self.state == BatteryState::Dead {
            self.current_a = 0.0;
            return;
        }

        let curve = if power_w > 0.0 {
            &self.discharge_curve
        } else {
            &self.charge_curve
        };
        self.voc = curve.voltage(self.soc);

        let rr = self.resistance_ohm;
        let discriminant = self.voc * self.voc - 4.0 * rr * power_w;
        self.current_a = if discriminant < 0.0 {
            trace!(power_w, voc = self.voc, "battery request infeasible");
            0.0
        } else {
            -(self.voc - discriminant.sqrt()) / (2.0 * rr)
        };

        let delta_ah = self.current_a * dt_s / 3600.0;
        self.soc += delta_ah / ((1.0 - self.qloss) * self.capacity_ah);

        self.qloss += self
            .fade
            .increment(self.qloss, self.current_a, delta_ah, self.capacity_ah);

        self.classify();
    }

    fn classify(&mut self) {
        if self.state == BatteryState::Dead {
            return;
        }
        self.state = if self.qloss >= END_OF_LIFE_QLOSS {
            debug!(qloss = self.qloss, "battery reached end of life");
            BatteryState::Dead
        } else if self.soc >= 1.0 - self.qloss || self.soc >= FULL_SOC {
            BatteryState::Full
        } else if self.soc <= EMPTY_SOC {
            BatteryState::Empty
        } else {
            BatteryState::Normal
        };
    }
}

impl StorageDevice for Battery {
    fn update(&mut self, power_w: f64, dt_s: f64) {
        Battery::update(self, power_w, dt_s);
    }

    fn open_circuit_voltage(&self) -> f64 {
        self.voc
    }

    fn soc(&self) -> f64 {
        self.soc
    }

    fn device_type(&self) -> &'static str {
        "Battery"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_battery() {
        let b = Battery::new(3.0);
        assert_eq!(b.capacity_ah, 3.0);
        assert_eq!(b.soc(), 0.75);
        assert_eq!(b.qloss(), 0.01);
        assert_eq!(b.state(), BatteryState::Normal);
        assert!((b.voc() - OcvCurve::DISCHARGE.voltage(0.75)).abs() < 1e-12);
        assert!(b.voc() > 3.6 && b.voc() < 3.8);
    }

    #[test]
    #[should_panic]
    fn test_invalid_capacity() {
        Battery::new(0.0);
    }

    #[test]
    fn test_discharge_current_and_soc() {
        let mut b = Battery::new(3.0);
        b.update(1.0, 1.0);
        let voc = OcvCurve::DISCHARGE.voltage(0.75);
        let expected_i = -(voc - (voc * voc - 4.0 * 0.46).sqrt()) / (2.0 * 0.46);
        assert!((b.current_a() - expected_i).abs() < 1e-12);
        assert!(b.current_a() < 0.0);
        let expected_soc = 0.75 + expected_i / 3600.0 / (0.99 * 3.0);
        assert!((b.soc() - expected_soc).abs() < 1e-12);
    }

    #[test]
    fn test_charge_uses_charge_curve() {
        let mut b = Battery::new(3.0);
        b.update(-1.0, 1.0);
        assert!((b.voc() - OcvCurve::CHARGE.voltage(0.75)).abs() < 1e-12);
        assert!(b.current_a() > 0.0);
        assert!(b.soc() > 0.75);
    }

    #[test]
    fn test_infeasible_demand_gives_zero_current() {
        // V² < 4·R·P at 100 W
        let mut b = Battery::new(3.0);
        b.update(100.0, 1.0);
        assert_eq!(b.current_a(), 0.0);
        assert_eq!(b.soc(), 0.75);
        assert_eq!(b.qloss(), 0.01);
    }

    #[test]
    fn test_empty_discharge_marks_depleted() {
        let mut b = Battery::new(3.0).with_soc(0.05);
        assert_eq!(b.state(), BatteryState::Empty);
        b.update(0.5, 1.0);
        assert_eq!(b.current_a(), 0.0);
        assert!(b.is_depleted());
        assert_eq!(b.soc(), 0.05);
        assert_eq!(b.qloss(), 0.01);
    }

    #[test]
    fn test_empty_battery_accepts_charge() {
        let mut b = Battery::new(3.0).with_soc(0.05);
        b.update(-2.0, 3600.0);
        assert!(b.soc() > 0.05);
    }

    #[test]
    fn test_full_rejects_charge() {
        let mut b = Battery::new(3.0).with_soc(0.995);
        assert_eq!(b.state(), BatteryState::Full);
        b.update(-1.0, 1.0);
        assert_eq!(b.current_a(), 0.0);
        assert_eq!(b.soc(), 0.995);
    }

    #[test]
    fn test_full_threshold_follows_faded_capacity() {
        let b = Battery::new(3.0).with_qloss(0.2).with_soc(0.85);
        assert_eq!(b.state(), BatteryState::Full);
    }

    #[test]
    fn test_dead_is_absorbing() {
        let mut b = Battery::new(3.0).with_qloss(0.95);
        assert_eq!(b.state(), BatteryState::Dead);
        b.update(-1.0, 1.0);
        assert_eq!(b.state(), BatteryState::Dead);
        assert_eq!(b.soc(), 0.75);
        b.update(1.0, 1.0);
        assert_eq!(b.state(), BatteryState::Dead);
        assert!(b.is_depleted());
    }

    #[test]
    fn test_fade_grows_with_throughput() {
        let mut b = Battery::new(3.0);
        let q0 = b.qloss();
        b.update(2.0, 60.0);
        assert!(b.qloss() > q0);
    }

    #[test]
    fn test_storage_trait_reports_state() {
        let b = Battery::new(3.0);
        let dev: &dyn StorageDevice = &b;
        assert_eq!(dev.soc(), 0.75);
        assert_eq!(dev.device_type(), "Battery");
    }

    proptest! {
        #[test]
        fn qloss_never_decreases(powers in proptest::collection::vec(-4.0f64..4.0, 1..300)) {
            let mut b = Battery::new(0.5);
            let mut last = b.qloss();
            let mut dead = false;
            for p in powers {
                b.update(p, 60.0);
                prop_assert!(b.qloss() >= last);
                last = b.qloss();
                if dead {
                    prop_assert_eq!(b.state(), BatteryState::Dead);
                }
                dead = b.state() == BatteryState::Dead;
            }
        }
    }
}
