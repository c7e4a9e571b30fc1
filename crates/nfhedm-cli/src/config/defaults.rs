use nfhedm::engine::config::ToleranceStrategy;

pub struct DefaultsConfig {
    pub workers: usize,
    pub chunk_size: usize,
    pub strategy: ToleranceStrategy,
    pub omega_step_degrees: f64,
    pub grid_min: f64,
    pub grid_max: f64,
    pub grid_points: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            chunk_size: 100,
            strategy: ToleranceStrategy::DilatedVolume,
            omega_step_degrees: 1.0,
            grid_min: -0.25,
            grid_max: 0.25,
            grid_points: 101,
        }
    }
}
