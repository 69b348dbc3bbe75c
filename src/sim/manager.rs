//! Energy management policies splitting a node's power demand between the
//! supercapacitor and the battery.
//!
//! Every policy is a pure function of [`ManagerInput`]. The returned
//! [`Allocation`] always satisfies `sc_w + battery_w + curtailed_w == demand_w`;
//! only the adaptive rule-based policy ever curtails.

use crate::devices::{BatteryState, ChargeState};
use crate::error::{SimError, SimResult};

/// Hysteresis offset for the parallel policy's discharge buffer (V).
const PARALLEL_DISCHARGE_OFFSET_V: f64 = 0.9;
/// Hysteresis band for the parallel policy's charge path (V).
const PARALLEL_CHARGE_BAND_V: f64 = 0.3;
/// Trickle charge into the supercapacitor, as a fraction of average sensor power.
const PARALLEL_TRICKLE_FRACTION: f64 = 0.2;
/// Harvest considered healthy, as a fraction of average sensor power.
const PARALLEL_HEALTHY_FRACTION: f64 = 0.5;
/// Charging demand considered large, as a multiple of average sensor power.
const LARGE_CHARGE_MULTIPLE: f64 = 5.0;

/// Default raw policy parameter vector `k`.
pub const DEFAULT_POLICY_K: [f64; 5] = [2.0, 0.64, 3.4, -0.7, 0.0];

/// Thresholds of the rule-based policies, derived once from the raw vector
/// `k`, the node's average sensor power and the supercapacitor's rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveParams {
    /// Harvest below which cross-charging may start (W).
    pub solar_threshold_w: f64,
    /// Supercapacitor voltage below which cross-charging starts (V).
    pub sc_voltage_threshold_v: f64,
    /// Power moved from the battery into the supercapacitor while cross-charging (W).
    pub cross_charge_w: f64,
    /// Fade-avoidance slope `k3`.
    pub fade_slope: f64,
    /// Fade-avoidance offset `k4`.
    pub fade_offset: f64,
}

impl AdaptiveParams {
    /// Derives `[k0·Ps_avg, k1·Vm, k2·Ps_avg, k3, k4]`.
    pub fn derive(k: [f64; 5], avg_sensor_w: f64, sc_max_voltage: f64) -> Self {
        Self {
            solar_threshold_w: k[0] * avg_sensor_w,
            sc_voltage_threshold_v: k[1] * sc_max_voltage,
            cross_charge_w: k[2] * avg_sensor_w,
            fade_slope: k[3],
            fade_offset: k[4],
        }
    }

    /// Charging efficiency factor for the battery at `soc`, capped at 1.
    ///
    /// Linear in SOC: `(1 - k3·k4 - (1 - k4)·soc) / (1 - k3)`.
    pub fn charge_efficiency(&self, soc: f64) -> f64 {
        let (k3, k4) = (self.fade_slope, self.fade_offset);
        ((1.0 - k3 * k4 - (1.0 - k4) * soc) / (1.0 - k3)).min(1.0)
    }
}

/// Everything a policy may look at for one allocation.
#[derive(Debug, Clone, Copy)]
pub struct ManagerInput {
    /// Net demand (W); positive draws from storage, negative offers surplus.
    pub demand_w: f64,
    pub sc_state: ChargeState,
    pub battery_state: BatteryState,
    pub sc_voc: f64,
    pub battery_voc: f64,
    pub battery_soc: f64,
    pub sc_capacitance_f: f64,
    /// Harvested power this step (W).
    pub harvested_w: f64,
    /// Average sensor power over a quiet period (W).
    pub avg_sensor_w: f64,
    pub dt_s: f64,
}

/// Result of splitting one demand.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Allocation {
    /// Power requested from the supercapacitor (W).
    pub sc_w: f64,
    /// Power requested from the battery (W).
    pub battery_w: f64,
    /// Surplus deliberately not stored (W); nonzero only for the adaptive policy.
    pub curtailed_w: f64,
    /// Battery charging efficiency applied this step, if any.
    pub efficiency: Option<f64>,
}

impl Allocation {
    fn battery(demand_w: f64) -> Self {
        Self {
            battery_w: demand_w,
            ..Self::default()
        }
    }

    fn supercap(demand_w: f64) -> Self {
        Self {
            sc_w: demand_w,
            ..Self::default()
        }
    }

    fn split(sc_w: f64, battery_w: f64) -> Self {
        Self {
            sc_w,
            battery_w,
            ..Self::default()
        }
    }

    /// Total power accounted for by this allocation.
    pub fn total_w(&self) -> f64 {
        self.sc_w + self.battery_w + self.curtailed_w
    }
}

/// Energy management policy, selected once per node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyPolicy {
    /// Battery serves everything.
    BatteryOnly,
    /// Supercapacitor serves unless it is at its limit for the direction.
    SupercapFirst,
    /// Higher voltage discharges, lower voltage charges.
    VoltageControlled,
    /// Supercapacitor share bounded by its energy buffer above the battery.
    HystereticParallel,
    /// Cross-charging under low harvest, then limit-aware routing.
    RuleBased(AdaptiveParams),
    /// As `RuleBased`, plus SOC-dependent curtailment of large battery charges.
    AdaptiveRuleBased(AdaptiveParams),
}

impl EnergyPolicy {
    /// Maps a numeric policy id (1–6) to its variant.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPolicy`] for any other id.
    pub fn from_id(id: u8, params: AdaptiveParams) -> SimResult<Self> {
        match id {
            1 => Ok(Self::BatteryOnly),
            2 => Ok(Self::SupercapFirst),
            3 => Ok(Self::VoltageControlled),
            4 => Ok(Self::HystereticParallel),
            5 => Ok(Self::RuleBased(params)),
            6 => Ok(Self::AdaptiveRuleBased(params)),
            other => Err(SimError::UnknownPolicy(other)),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::BatteryOnly => 1,
            Self::SupercapFirst => 2,
            Self::VoltageControlled => 3,
            Self::HystereticParallel => 4,
            Self::RuleBased(_) => 5,
            Self::AdaptiveRuleBased(_) => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BatteryOnly => "battery_only",
            Self::SupercapFirst => "supercap_first",
            Self::VoltageControlled => "voltage_control",
            Self::HystereticParallel => "hysteretic_parallel",
            Self::RuleBased(_) => "rule_based",
            Self::AdaptiveRuleBased(_) => "adaptive_rule_based",
        }
    }

    /// Splits `input.demand_w` between the two storage devices.
    pub fn allocate(&self, input: &ManagerInput) -> Allocation {
        let d = input.demand_w;
        match self {
            Self::BatteryOnly => Allocation::battery(d),
            Self::SupercapFirst => {
                if sc_can_serve(d, input.sc_state) {
                    Allocation::supercap(d)
                } else {
                    Allocation::battery(d)
                }
            }
            Self::VoltageControlled => {
                let sc_higher = input.sc_voc > input.battery_voc;
                let sc_lower = input.sc_voc < input.battery_voc;
                if (d > 0.0 && sc_higher) || (d < 0.0 && sc_lower) {
                    Allocation::supercap(d)
                } else {
                    Allocation::battery(d)
                }
            }
            Self::HystereticParallel => hysteretic_parallel(input),
            Self::RuleBased(params) => rule_based(input, params, false),
            Self::AdaptiveRuleBased(params) => rule_based(input, params, true),
        }
    }
}

/// Whether the supercapacitor is away from its hard limit for the direction of `demand_w`.
fn sc_can_serve(demand_w: f64, sc_state: ChargeState) -> bool {
    if demand_w > 0.0 {
        sc_state != ChargeState::Empty
    } else {
        sc_state != ChargeState::Full
    }
}

/// Power equivalent of the capacitor energy held across `dv` volts.
fn buffer_power(capacitance_f: f64, dv: f64, dt_s: f64) -> f64 {
    0.5 * capacitance_f * dv * dv / dt_s
}

fn hysteretic_parallel(input: &ManagerInput) -> Allocation {
    let d = input.demand_w;
    let c = input.sc_capacitance_f;
    let dv = input.sc_voc - input.battery_voc;

    if d > 0.0 {
        let sc_share = if input.harvested_w > PARALLEL_HEALTHY_FRACTION * input.avg_sensor_w {
            if dv <= -PARALLEL_DISCHARGE_OFFSET_V && input.sc_state != ChargeState::Empty {
                return Allocation::battery(d);
            }
            buffer_power(c, dv + PARALLEL_DISCHARGE_OFFSET_V, input.dt_s)
        } else if dv > 0.0 {
            buffer_power(c, dv, input.dt_s)
        } else {
            let trickle = -PARALLEL_TRICKLE_FRACTION * input.avg_sensor_w;
            return Allocation::split(trickle, d - trickle);
        };
        if sc_share > d {
            Allocation::supercap(d)
        } else {
            Allocation::split(sc_share, d - sc_share)
        }
    } else {
        if dv >= PARALLEL_CHARGE_BAND_V {
            return Allocation::battery(d);
        }
        let sc_share = -buffer_power(c, dv - PARALLEL_CHARGE_BAND_V, input.dt_s);
        if sc_share < d {
            Allocation::supercap(d)
        } else {
            Allocation::split(sc_share, d - sc_share)
        }
    }
}

fn rule_based(input: &ManagerInput, params: &AdaptiveParams, adaptive: bool) -> Allocation {
    let mut d = input.demand_w;
    let mut alloc = Allocation::default();

    if input.harvested_w < params.solar_threshold_w && input.sc_voc < params.sc_voltage_threshold_v
    {
        alloc.battery_w = params.cross_charge_w;
        alloc.sc_w = -params.cross_charge_w;
    }

    if sc_can_serve(d, input.sc_state) {
        alloc.sc_w += d;
        return alloc;
    }

    if adaptive && d < 0.0 && d < -LARGE_CHARGE_MULTIPLE * input.avg_sensor_w {
        let efficiency = params.charge_efficiency(input.battery_soc);
        let scaled = efficiency * d;
        alloc.curtailed_w = d - scaled;
        alloc.efficiency = Some(efficiency);
        d = scaled;
    }
    alloc.battery_w += d;
    alloc
}
