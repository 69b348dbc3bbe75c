//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::devices::{Battery, SensorLoad, SolarHarvester, SuperCapacitor};
use crate::error::{SimError, SimResult};
use crate::inputs::SolarProfile;
use crate::network::ForestLayout;
use crate::sim::manager::{AdaptiveParams, DEFAULT_POLICY_K, EnergyPolicy};
use crate::sim::node::NodeEnergySystem;
use crate::sim::types::{DEFAULT_DEGRADATION_LIMIT, SimConfig};

/// Nominal cell voltage used to express battery capacity as energy (V).
const NOMINAL_CELL_VOLTAGE: f64 = 3.7;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Sensor duty cycle shared by every node.
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub battery: BatteryConfig,
    #[serde(default)]
    pub supercap: SupercapConfig,
    /// Panel and daylight profile.
    #[serde(default)]
    pub solar: SolarConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Forest deployment and radio parameters.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Communication event generation.
    #[serde(default)]
    pub events: EventConfig,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Step length in seconds (must be > 0).
    pub dt_s: f64,
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Seed for cloud occlusion.
    pub seed: u64,
    /// Capacity loss at which a node is stopped early.
    pub degradation_limit: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_s: 1.0,
            days: 1,
            seed: 42,
            degradation_limit: DEFAULT_DEGRADATION_LIMIT,
        }
    }
}

/// Sensor duty-cycle parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// Duty-cycle period (s).
    pub period_s: f64,
    /// Active window per period (s).
    pub active_s: f64,
    pub sleep_mw: f64,
    pub active_mw: f64,
    /// Draw while handling an event (mW).
    pub high_mw: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            period_s: 10.0,
            active_s: 2.0,
            sleep_mw: 10.0,
            active_mw: 20.0,
            high_mw: 100.0,
        }
    }
}

/// Battery parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Nominal capacity (Ah).
    pub capacity_ah: f64,
    /// Initial state of charge (0.0–1.0).
    pub initial_soc: f64,
    /// Capacity loss already accumulated at the start (0.0–1.0, exclusive).
    pub initial_qloss: f64,
    pub resistance_ohm: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_ah: 3.0,
            initial_soc: 0.75,
            initial_qloss: 0.01,
            resistance_ohm: 0.46,
        }
    }
}

/// Supercapacitor parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupercapConfig {
    /// Rated voltage (V).
    pub max_voltage: f64,
    pub resistance_ohm: f64,
    pub capacitance_f: f64,
}

impl Default for SupercapConfig {
    fn default() -> Self {
        Self {
            max_voltage: 5.0,
            resistance_ohm: 1.0857,
            capacitance_f: 1.0,
        }
    }
}

/// Solar panel and irradiance profile parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Panel area (cm²).
    pub area_cm2: f64,
    /// Clear-sky irradiance at noon (W/m²).
    pub peak_irradiance: f64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    /// Per-sample chance of full occlusion (0.0–1.0).
    pub cloud_probability: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            area_cm2: 60.0,
            peak_irradiance: 1000.0,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
            cloud_probability: 0.1,
        }
    }
}

/// Energy management policy selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Policy id (1–6).
    pub id: u8,
    /// Raw parameter vector of the rule-based policies.
    pub k: [f64; 5],
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            id: 1,
            k: DEFAULT_POLICY_K,
        }
    }
}

/// Deployment and radio parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Number of child nodes (must be > 0).
    pub child_nodes: u32,
    /// Radius of the deployment disk around the sink (m).
    pub forest_radius_m: f64,
    /// In-range neighbours required to place a node.
    pub min_neighbors: usize,
    pub radio_range_m: f64,
    /// Energy per transmission per squared metre (J/m²).
    pub cost_coefficient: f64,
    /// Placement seed.
    pub seed: u64,
    /// Draw forwarding costs from the relaying node's storage.
    pub charge_relays: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            child_nodes: 10,
            forest_radius_m: 500.0,
            min_neighbors: 1,
            radio_range_m: 100.0,
            cost_coefficient: 0.001,
            seed: 81,
            charge_relays: true,
        }
    }
}

/// Communication event generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventConfig {
    /// Per-step event probability for each node (0.0–1.0).
    pub probability: f64,
    pub seed: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            probability: 0.2,
            seed: 42,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.dt_s"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: battery-only management.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the voltage-control preset (policy 3).
    pub fn voltage_control() -> Self {
        Self {
            policy: PolicyConfig {
                id: 3,
                ..PolicyConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the adaptive preset (policy 6) with SOC-dependent curtailment.
    pub fn adaptive() -> Self {
        Self {
            policy: PolicyConfig {
                id: 6,
                ..PolicyConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "voltage_control", "adaptive"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "voltage_control" => Ok(Self::voltage_control()),
            "adaptive" => Ok(Self::adaptive()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Number of steps covering `simulation.days` at `simulation.dt_s`.
    pub fn num_steps(&self) -> usize {
        let s = &self.simulation;
        (s.days as f64 * 86_400.0 / s.dt_s) as usize
    }

    /// Run timing derived from the `[simulation]` and `[network]` sections.
    pub fn sim_config(&self) -> SimConfig {
        SimConfig::new(self.simulation.dt_s, self.num_steps())
            .with_degradation_limit(self.simulation.degradation_limit)
            .with_relay_charging(self.network.charge_relays)
    }

    pub fn solar_profile(&self) -> SolarProfile {
        let s = &self.solar;
        SolarProfile {
            peak_irradiance: s.peak_irradiance,
            sunrise_hour: s.sunrise_hour,
            sunset_hour: s.sunset_hour,
            cloud_probability: s.cloud_probability,
        }
    }

    /// Forest deployment described by the `[network]` section.
    pub fn forest_layout(&self) -> ForestLayout {
        let n = &self.network;
        ForestLayout {
            child_nodes: n.child_nodes,
            forest_radius_m: n.forest_radius_m,
            min_neighbors: n.min_neighbors,
            radio_range_m: n.radio_range_m,
            cost_coefficient: n.cost_coefficient,
            initial_energy_j: self.battery.capacity_ah * 3600.0 * NOMINAL_CELL_VOLTAGE,
            seed: n.seed,
            ..ForestLayout::default()
        }
    }

    /// The sensor load every node carries.
    pub fn sensor(&self) -> SensorLoad {
        let s = &self.sensor;
        SensorLoad::from_milliwatts(s.period_s, s.active_s, s.sleep_mw, s.active_mw, s.high_mw)
    }

    /// Builds one node's energy system.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the scenario does not validate.
    pub fn build_node_system(&self) -> SimResult<NodeEnergySystem> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(SimError::Config(errors));
        }

        let sensor = self.sensor();
        let sc = &self.supercap;
        let supercap = SuperCapacitor::new(sc.max_voltage, sc.resistance_ohm, sc.capacitance_f);
        let b = &self.battery;
        let battery = Battery::new(b.capacity_ah)
            .with_soc(b.initial_soc)
            .with_qloss(b.initial_qloss)
            .with_resistance(b.resistance_ohm);
        let params =
            AdaptiveParams::derive(self.policy.k, sensor.average_power_w(), sc.max_voltage);
        let policy = EnergyPolicy::from_id(self.policy.id, params)?;

        Ok(NodeEnergySystem::new(
            self.simulation.dt_s,
            sensor,
            SolarHarvester::new(self.solar.area_cm2),
            supercap,
            battery,
            policy,
        ))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let s = &self.simulation;
        check(s.dt_s > 0.0, "simulation.dt_s", "must be > 0");
        check(s.days > 0, "simulation.days", "must be > 0");
        check(
            s.degradation_limit > 0.0 && s.degradation_limit < 1.0,
            "simulation.degradation_limit",
            "must be in (0.0, 1.0)",
        );

        let sen = &self.sensor;
        check(sen.period_s > 0.0, "sensor.period_s", "must be > 0");
        check(
            (0.0..=sen.period_s).contains(&sen.active_s),
            "sensor.active_s",
            "must be in [0, sensor.period_s]",
        );
        for (field, value) in [
            ("sensor.sleep_mw", sen.sleep_mw),
            ("sensor.active_mw", sen.active_mw),
            ("sensor.high_mw", sen.high_mw),
        ] {
            check(value >= 0.0, field, "must be >= 0");
        }

        let bat = &self.battery;
        check(bat.capacity_ah > 0.0, "battery.capacity_ah", "must be > 0");
        check(
            (0.0..=1.0).contains(&bat.initial_soc),
            "battery.initial_soc",
            "must be in [0.0, 1.0]",
        );
        check(
            bat.initial_qloss > 0.0 && bat.initial_qloss < 1.0,
            "battery.initial_qloss",
            "must be in (0.0, 1.0)",
        );
        check(bat.resistance_ohm > 0.0, "battery.resistance_ohm", "must be > 0");

        let sc = &self.supercap;
        check(sc.max_voltage > 0.0, "supercap.max_voltage", "must be > 0");
        check(sc.resistance_ohm > 0.0, "supercap.resistance_ohm", "must be > 0");
        check(sc.capacitance_f > 0.0, "supercap.capacitance_f", "must be > 0");

        let sol = &self.solar;
        check(sol.area_cm2 >= 0.0, "solar.area_cm2", "must be >= 0");
        check(sol.peak_irradiance >= 0.0, "solar.peak_irradiance", "must be >= 0");
        check(
            sol.sunrise_hour < sol.sunset_hour,
            "solar.sunrise_hour",
            "must be < solar.sunset_hour",
        );
        check(
            sol.sunrise_hour >= 0.0 && sol.sunset_hour <= 24.0,
            "solar.sunset_hour",
            "daylight must lie within [0, 24] hours",
        );
        check(
            (0.0..=1.0).contains(&sol.cloud_probability),
            "solar.cloud_probability",
            "must be in [0.0, 1.0]",
        );

        check(
            (1..=6).contains(&self.policy.id),
            "policy.id",
            "must be in 1..=6",
        );
        check(
            self.policy.k.iter().all(|k| k.is_finite()),
            "policy.k",
            "must be finite",
        );
        check(self.policy.k[3] != 1.0, "policy.k", "k[3] must not be 1");

        let net = &self.network;
        check(net.child_nodes > 0, "network.child_nodes", "must be > 0");
        check(net.forest_radius_m > 0.0, "network.forest_radius_m", "must be > 0");
        check(net.radio_range_m > 0.0, "network.radio_range_m", "must be > 0");
        check(
            net.cost_coefficient >= 0.0,
            "network.cost_coefficient",
            "must be >= 0",
        );

        check(
            (0.0..=1.0).contains(&self.events.probability),
            "events.probability",
            "must be in [0.0, 1.0]",
        );

        errors
    }
}
