/// Discrete simulation clock over a fixed number of steps of length `dt`.
///
/// # Examples
///
/// ```
/// use wsn_energy_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3, 60.0);
/// let mut steps = Vec::new();
///
/// clock.run(|step| steps.push(step));
/// assert_eq!(steps, vec![0, 1, 2]);
/// assert_eq!(clock.elapsed_s(), 180.0);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next step to hand out
    current: usize,
    /// Total steps in the run
    total: usize,
    dt_s: f64,
}

impl Clock {
    /// Creates a clock running `total` steps of `dt_s` seconds.
    pub fn new(total: usize, dt_s: f64) -> Self {
        Self {
            current: 0,
            total,
            dt_s,
        }
    }

    /// Returns the next step index and advances, or `None` once finished.
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some(step)
        } else {
            None
        }
    }

    /// Calls `f` for each remaining step.
    pub fn run(&mut self, mut f: impl FnMut(usize)) {
        while let Some(step) = self.tick() {
            f(step);
        }
    }

    /// Steps handed out so far.
    pub fn completed(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Simulated seconds covered by the steps handed out so far.
    pub fn elapsed_s(&self) -> f64 {
        self.current as f64 * self.dt_s
    }

    /// Hour of day (0..24) at the start of `step`.
    pub fn hour_of_day(&self, step: usize) -> f64 {
        (step as f64 * self.dt_s / 3600.0).rem_euclid(24.0)
    }
}
