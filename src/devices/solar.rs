use crate::devices::types::{Device, DeviceContext};

/// Default quadratic coefficient of the panel regression (per (W/m²)²).
pub const DEFAULT_A2: f64 = -7.94e-7;
/// Default linear coefficient of the panel regression.
pub const DEFAULT_A1: f64 = 0.0108;
/// Default constant term of the panel regression.
pub const DEFAULT_A0: f64 = -0.0287;

/// A small photovoltaic harvester.
///
/// Output follows a quadratic regression in irradiance, floored at zero and
/// scaled by panel area. The regression yields mW per cm² of panel, so the
/// product with area in cm² is divided by 1000 to give watts.
#[derive(Debug, Clone)]
pub struct SolarHarvester {
    /// Panel area (cm²).
    pub area_cm2: f64,

    /// Regression coefficients `[a2, a1, a0]`.
    pub coefficients: [f64; 3],
}

impl SolarHarvester {
    /// Creates a harvester with the default regression coefficients.
    ///
    /// Negative areas are clamped to zero.
    pub fn new(area_cm2: f64) -> Self {
        Self::with_coefficients(area_cm2, [DEFAULT_A2, DEFAULT_A1, DEFAULT_A0])
    }

    /// Creates a harvester with custom regression coefficients `[a2, a1, a0]`.
    pub fn with_coefficients(area_cm2: f64, coefficients: [f64; 3]) -> Self {
        Self {
            area_cm2: area_cm2.max(0.0),
            coefficients,
        }
    }

    /// Harvested power in watts for a global irradiance in W/m².
    pub fn power(&self, irradiance: f64) -> f64 {
        let [a2, a1, a0] = self.coefficients;
        let g = irradiance;
        let pm = (a2 * g * g + a1 * g + a0).max(0.0);
        pm * self.area_cm2 / 1000.0
    }
}

impl Device for SolarHarvester {
    fn power_w(&self, context: &DeviceContext) -> f64 {
        self.power(context.irradiance)
    }

    fn device_type(&self) -> &'static str {
        "SolarHarvester"
    }
}
