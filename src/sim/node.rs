//! One node's composed energy system.

use tracing::info;

use crate::devices::{
    Battery, BatteryState, ChargeState, Device, DeviceContext, SensorLoad, SolarHarvester,
    StorageDevice, SuperCapacitor,
};

use super::manager::{Allocation, EnergyPolicy, ManagerInput};
use super::types::{NodeState, StepOutput};

/// DC/DC conversion efficiency between storage and sensor.
pub const SENSOR_CONVERTER_EFFICIENCY: f64 = 0.9;
/// DC/DC conversion efficiency between panel and storage.
pub const SOLAR_CONVERTER_EFFICIENCY: f64 = 0.9;

/// Sensor, harvester, supercapacitor and battery of one node, plus the policy
/// that arbitrates between the two storage devices.
///
/// Created once per node before a run and advanced with [`step`](Self::step).
/// Once the battery dies the system stops accepting updates.
#[derive(Debug, Clone)]
pub struct NodeEnergySystem {
    dt_s: f64,
    sensor: SensorLoad,
    solar: SolarHarvester,
    supercap: SuperCapacitor,
    battery: Battery,
    policy: EnergyPolicy,
    avg_sensor_w: f64,
    sensor_efficiency: f64,
    solar_efficiency: f64,

    system_time_s: f64,
    harvested_w: f64,
    demand_w: f64,
    sc_w: f64,
    battery_w: f64,
    efficiency: f64,
    state: NodeState,
}

impl NodeEnergySystem {
    /// Composes a node's energy system.
    ///
    /// The supercapacitor starts at the battery's open-circuit voltage.
    ///
    /// # Panics
    ///
    /// Panics if `dt_s` is not positive.
    pub fn new(
        dt_s: f64,
        sensor: SensorLoad,
        solar: SolarHarvester,
        mut supercap: SuperCapacitor,
        battery: Battery,
        policy: EnergyPolicy,
    ) -> Self {
        assert!(dt_s > 0.0, "dt must be > 0");
        supercap.set_voltage(battery.voc());
        let avg_sensor_w = sensor.average_power_w();
        let mut system = Self {
            dt_s,
            sensor,
            solar,
            supercap,
            battery,
            policy,
            avg_sensor_w,
            sensor_efficiency: SENSOR_CONVERTER_EFFICIENCY,
            solar_efficiency: SOLAR_CONVERTER_EFFICIENCY,
            system_time_s: 0.0,
            harvested_w: 0.0,
            demand_w: 0.0,
            sc_w: 0.0,
            battery_w: 0.0,
            efficiency: 1.0,
            state: NodeState::Normal,
        };
        system.judge_state();
        system
    }

    /// Advances one time step.
    ///
    /// Returns `None` without touching any state once the node is dead.
    pub fn step(&mut self, event: bool, irradiance: f64) -> Option<StepOutput> {
        if self.state == NodeState::Dead {
            return None;
        }
        self.system_time_s += self.dt_s;

        let ctx = DeviceContext::at(self.system_time_s)
            .with_event(event)
            .with_irradiance(irradiance);
        let sensor_w = self.sensor.power_w(&ctx);
        let solar_w = self.solar.power_w(&ctx);
        self.harvested_w = solar_w;

        let demand_w = sensor_w / self.sensor_efficiency - solar_w * self.solar_efficiency;
        let alloc = self.dispatch(demand_w);

        self.demand_w = demand_w;
        self.sc_w = alloc.sc_w;
        self.battery_w = alloc.battery_w;

        Some(StepOutput {
            demand_w,
            sensor_w,
            solar_w,
            sc_w: alloc.sc_w,
            battery_w: alloc.battery_w,
        })
    }

    /// Serves an extra demand (W) for one step length without advancing time.
    ///
    /// Goes through the same policy and device updates as ordinary demand.
    /// Returns `None` once the node is dead.
    pub fn absorb(&mut self, demand_w: f64) -> Option<Allocation> {
        if self.state == NodeState::Dead {
            return None;
        }
        Some(self.dispatch(demand_w))
    }

    fn dispatch(&mut self, demand_w: f64) -> Allocation {
        let input = ManagerInput {
            demand_w,
            sc_state: self.supercap.state(),
            battery_state: self.battery.state(),
            sc_voc: self.supercap.voc(),
            battery_voc: self.battery.voc(),
            battery_soc: self.battery.soc(),
            sc_capacitance_f: self.supercap.capacitance_f,
            harvested_w: self.harvested_w,
            avg_sensor_w: self.avg_sensor_w,
            dt_s: self.dt_s,
        };
        let alloc = self.policy.allocate(&input);
        if let Some(efficiency) = alloc.efficiency {
            self.efficiency = efficiency;
        }

        StorageDevice::update(&mut self.supercap, alloc.sc_w, self.dt_s);
        StorageDevice::update(&mut self.battery, alloc.battery_w, self.dt_s);
        self.judge_state();
        alloc
    }

    fn judge_state(&mut self) {
        let next = if self.battery.state() == BatteryState::Dead {
            NodeState::Dead
        } else if self.battery.state() == BatteryState::Empty
            && self.supercap.state() == ChargeState::Empty
        {
            NodeState::Empty
        } else {
            NodeState::Normal
        };
        if next != self.state && next == NodeState::Dead {
            info!(
                time_s = self.system_time_s,
                qloss = self.battery.qloss(),
                "node energy system dead"
            );
        }
        self.state = next;
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    pub fn system_time_s(&self) -> f64 {
        self.system_time_s
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn policy(&self) -> &EnergyPolicy {
        &self.policy
    }

    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    pub fn supercap(&self) -> &SuperCapacitor {
        &self.supercap
    }

    pub fn sensor(&self) -> &SensorLoad {
        &self.sensor
    }

    /// Average sensor power over a quiet period (W).
    pub fn avg_sensor_w(&self) -> f64 {
        self.avg_sensor_w
    }

    /// Net demand of the last step (W).
    pub fn demand_w(&self) -> f64 {
        self.demand_w
    }

    /// Supercapacitor share of the last step (W).
    pub fn sc_w(&self) -> f64 {
        self.sc_w
    }

    /// Battery share of the last step (W).
    pub fn battery_w(&self) -> f64 {
        self.battery_w
    }

    /// Most recent battery charging efficiency factor applied by the policy.
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::manager::{AdaptiveParams, DEFAULT_POLICY_K};

    fn system(policy: EnergyPolicy) -> NodeEnergySystem {
        NodeEnergySystem::new(
            1.0,
            SensorLoad::from_milliwatts(10.0, 2.0, 10.0, 20.0, 100.0),
            SolarHarvester::new(60.0),
            SuperCapacitor::default(),
            Battery::new(3.0),
            policy,
        )
    }

    #[test]
    fn sc_starts_at_battery_voltage() {
        let sys = system(EnergyPolicy::BatteryOnly);
        assert!((sys.supercap().voc() - sys.battery().voc()).abs() < 1e-12);
        assert_eq!(sys.supercap().state(), ChargeState::Normal);
        assert_eq!(sys.state(), NodeState::Normal);
    }

    #[test]
    fn step_forms_net_demand() {
        let mut sys = system(EnergyPolicy::BatteryOnly);
        let out = sys.step(false, 500.0).expect("node alive");
        let solar = SolarHarvester::new(60.0).power(500.0);
        assert!((out.sensor_w - 0.010).abs() < 1e-12);
        assert!((out.solar_w - solar).abs() < 1e-12);
        assert!((out.demand_w - (0.010 / 0.9 - solar * 0.9)).abs() < 1e-12);
        assert_eq!(out.battery_w, out.demand_w);
        assert_eq!(out.sc_w, 0.0);
        assert_eq!(sys.system_time_s(), 1.0);
    }

    #[test]
    fn night_discharge_drains_battery() {
        let mut sys = system(EnergyPolicy::BatteryOnly);
        let soc0 = sys.battery().soc();
        for _ in 0..100 {
            sys.step(true, 0.0);
        }
        assert!(sys.battery().soc() < soc0);
        assert_eq!(sys.system_time_s(), 100.0);
    }

    #[test]
    fn supercap_first_spares_the_battery() {
        let mut sys = system(EnergyPolicy::SupercapFirst);
        let soc0 = sys.battery().soc();
        let v0 = sys.supercap().voc();
        sys.step(true, 0.0);
        assert!((sys.battery().soc() - soc0).abs() < 1e-12);
        assert!(sys.supercap().voc() < v0);
    }

    #[test]
    fn dead_system_stops_updating() {
        let mut sys = NodeEnergySystem::new(
            1.0,
            SensorLoad::from_milliwatts(10.0, 2.0, 10.0, 20.0, 100.0),
            SolarHarvester::new(60.0),
            SuperCapacitor::default(),
            Battery::new(3.0).with_qloss(0.95),
            EnergyPolicy::BatteryOnly,
        );
        assert_eq!(sys.state(), NodeState::Dead);
        assert!(sys.step(false, 0.0).is_none());
        assert!(sys.absorb(1.0).is_none());
        assert_eq!(sys.system_time_s(), 0.0);
    }

    #[test]
    fn absorb_does_not_advance_time() {
        let mut sys = system(EnergyPolicy::BatteryOnly);
        sys.step(false, 0.0);
        let soc = sys.battery().soc();
        let alloc = sys.absorb(2.0).expect("node alive");
        assert_eq!(alloc.battery_w, 2.0);
        assert_eq!(sys.system_time_s(), 1.0);
        assert!(sys.battery().soc() < soc);
        // The step's own allocation is left as recorded
        assert!(sys.battery_w() < 1.0);
    }

    #[test]
    fn adaptive_policy_records_efficiency() {
        let params = AdaptiveParams::derive(DEFAULT_POLICY_K, 0.012, 5.0);
        let mut sys = system(EnergyPolicy::AdaptiveRuleBased(params));
        assert_eq!(sys.efficiency(), 1.0);
        // Bright light fills the SC, then large surplus reaches the battery
        for _ in 0..600 {
            sys.step(false, 1000.0);
        }
        assert_eq!(sys.supercap().state(), ChargeState::Full);
        assert!(sys.efficiency() < 1.0);
    }
}
