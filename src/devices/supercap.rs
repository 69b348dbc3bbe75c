use tracing::trace;

use crate::devices::types::{ChargeState, StorageDevice};

/// A supercapacitor buffer with an energy-balance voltage model.
///
/// The open-circuit voltage is the primary state variable. After every update
/// it lies in `[max_voltage / 4, max_voltage]`; the lower bound is the usable
/// cut-off of the downstream converter.
///
/// # Power Convention
/// - Positive power: discharging
/// - Negative power: charging
#[derive(Debug, Clone)]
pub struct SuperCapacitor {
    /// Maximum voltage (V).
    pub max_voltage: f64,

    /// Internal series resistance (Ω).
    pub resistance_ohm: f64,

    /// Capacitance (F).
    pub capacitance_f: f64,

    voc: f64,
    state: ChargeState,
    last_power_w: f64,
}

impl SuperCapacitor {
    /// Creates a fully charged supercapacitor.
    ///
    /// # Panics
    ///
    /// Panics if any parameter is not strictly positive.
    pub fn new(max_voltage: f64, resistance_ohm: f64, capacitance_f: f64) -> Self {
        assert!(max_voltage > 0.0);
        assert!(resistance_ohm > 0.0);
        assert!(capacitance_f > 0.0);
        Self {
            max_voltage,
            resistance_ohm,
            capacitance_f,
            voc: max_voltage,
            state: ChargeState::Full,
            last_power_w: 0.0,
        }
    }

    /// Sets the open-circuit voltage, clamped to the operating window, and
    /// re-derives the discrete state.
    pub fn set_voltage(&mut self, voc: f64) {
        self.voc = voc;
        self.settle();
    }

    /// Lowest usable voltage (V).
    pub fn min_voltage(&self) -> f64 {
        self.max_voltage / 4.0
    }

    pub fn voc(&self) -> f64 {
        self.voc
    }

    pub fn state(&self) -> ChargeState {
        self.state
    }

    /// Power most recently requested from the device (W).
    pub fn last_power_w(&self) -> f64 {
        self.last_power_w
    }

    /// Applies `power_w` for `dt_s` seconds.
    ///
    /// Discharging an empty or charging a full capacitor is rejected, as is a
    /// request whose lossless energy balance has no real voltage solution.
    pub fn update(&mut self, power_w: f64, dt_s: f64) {
        self.last_power_w = power_w;

        if power_w > 0.0 && self.state == ChargeState::Empty {
            trace!(power_w, "supercapacitor empty, discharge rejected");
            return;
        }
        if power_w < 0.0 && self.state == ChargeState::Full {
            trace!(power_w, "supercapacitor full, charge rejected");
            return;
        }

        let c = self.capacitance_f;
        let lossless = self.voc * self.voc - 2.0 * power_w * dt_s / c;
        if lossless < 0.0 {
            trace!(power_w, voc = self.voc, "supercapacitor request infeasible");
            return;
        }
        let voc_lossless = lossless.sqrt();

        let charge_delta = c * (voc_lossless - self.voc).abs();
        let resistive_loss = charge_delta * charge_delta * self.resistance_ohm / dt_s;
        let energy = resistive_loss + power_w * dt_s;

        let corrected = self.voc * self.voc - 2.0 * energy / c;
        self.voc = if corrected < 0.0 { 0.0 } else { corrected.sqrt() };
        self.settle();
    }

    fn settle(&mut self) {
        let vm = self.max_voltage;
        if self.voc >= vm {
            self.voc = vm;
            self.state = ChargeState::Full;
        } else if self.voc <= vm / 4.0 {
            self.voc = vm / 4.0;
            self.state = ChargeState::Empty;
        } else {
            self.state = ChargeState::Normal;
        }
    }
}

impl Default for SuperCapacitor {
    fn default() -> Self {
        Self::new(5.0, 1.0857, 1.0)
    }
}

impl StorageDevice for SuperCapacitor {
    fn update(&mut self, power_w: f64, dt_s: f64) {
        SuperCapacitor::update(self, power_w, dt_s);
    }

    fn open_circuit_voltage(&self) -> f64 {
        self.voc
    }

    fn soc(&self) -> f64 {
        self.voc / self.max_voltage
    }

    fn device_type(&self) -> &'static str {
        "SuperCapacitor"
    }
}
