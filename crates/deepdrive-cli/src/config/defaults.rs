/// Values used when neither the run file nor the command line sets them.
pub struct DefaultsConfig {
    pub cpus: usize,
    pub gpus: usize,
    pub replicas: usize,
    pub num_sims: usize,
    pub sim_len: f64,
    pub initial_sim_len: f64,
    pub num_models: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub bound: usize,
    pub step: f64,
    pub default_eps: f64,
    pub max_attempts: usize,
    pub min_samples: usize,
    pub task_processes: usize,
    pub task_threads: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cpus: 1,
            gpus: 0,
            replicas: 1,
            num_sims: 1,
            sim_len: 10.0,
            initial_sim_len: 0.1,
            num_models: 1,
            epochs: 100,
            batch_size: 512,
            bound: 150,
            step: 0.05,
            default_eps: 0.2,
            max_attempts: 100,
            min_samples: 10,
            task_processes: 1,
            task_threads: 1,
        }
    }
}
