//! Common types and traits for the node's energy components.

/// Contextual information passed to load and source models for one step.
///
/// # Fields
/// * `system_time_s` - Elapsed node time after advancing this step (s)
/// * `event` - Whether the external event stream flags a high-load step
/// * `irradiance` - Global irradiance for this step (W/m²)
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceContext {
    pub system_time_s: f64,
    pub event: bool,
    pub irradiance: f64,
}

impl DeviceContext {
    /// Creates a context for a quiet step without sunlight.
    pub fn at(system_time_s: f64) -> Self {
        Self {
            system_time_s,
            ..Self::default()
        }
    }

    /// Sets the event flag.
    pub fn with_event(mut self, event: bool) -> Self {
        self.event = event;
        self
    }

    /// Sets the irradiance sample.
    pub fn with_irradiance(mut self, irradiance: f64) -> Self {
        self.irradiance = irradiance;
        self
    }
}

/// A stateless device that draws or produces power as a function of context.
pub trait Device {
    /// Power magnitude in watts at the given context.
    ///
    /// Loads report consumption, sources report production; the node applies
    /// the sign when forming its net demand.
    fn power_w(&self, context: &DeviceContext) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// A storage element driven by signed power requests.
///
/// Sign convention: positive power discharges the device, negative power
/// charges it.
pub trait StorageDevice {
    /// Applies `power_w` for `dt_s` seconds.
    ///
    /// Requests the device cannot serve resolve to a no-op or zero current;
    /// this never fails.
    fn update(&mut self, power_w: f64, dt_s: f64);

    /// Current open-circuit voltage (V).
    fn open_circuit_voltage(&self) -> f64;

    /// Current state of charge.
    fn soc(&self) -> f64;

    fn device_type(&self) -> &'static str;
}

/// Discrete charge state of a supercapacitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Empty,
    Normal,
    Full,
}

impl ChargeState {
    /// Numeric code used in exported series (0 empty, 1 normal, 2 full).
    pub fn code(self) -> i8 {
        match self {
            ChargeState::Empty => 0,
            ChargeState::Normal => 1,
            ChargeState::Full => 2,
        }
    }
}

/// Discrete state of a battery. `Dead` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Dead,
    Empty,
    Normal,
    Full,
}

impl BatteryState {
    /// Numeric code used in exported series (-1 dead, 0 empty, 1 normal, 2 full).
    pub fn code(self) -> i8 {
        match self {
            BatteryState::Dead => -1,
            BatteryState::Empty => 0,
            BatteryState::Normal => 1,
            BatteryState::Full => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builder_sets_fields() {
        let ctx = DeviceContext::at(12.0).with_event(true).with_irradiance(800.0);
        assert_eq!(ctx.system_time_s, 12.0);
        assert!(ctx.event);
        assert_eq!(ctx.irradiance, 800.0);
    }

    #[test]
    fn state_codes_match_export_convention() {
        assert_eq!(BatteryState::Dead.code(), -1);
        assert_eq!(BatteryState::Full.code(), 2);
        assert_eq!(ChargeState::Empty.code(), 0);
        assert_eq!(ChargeState::Normal.code(), 1);
    }
}
