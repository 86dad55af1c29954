pub const DEFAULT_INTAKE_CAPACITY: usize = 100;
pub const DEFAULT_THREAD_DEMAND: usize = 1;

#[derive(Debug, Clone)]
pub struct MillConfig {
    pub workers: Vec<WorkerConfig>,
    pub intake_capacity: usize,
    pub default_thread_demand: usize,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub id: String,
    pub num_threads: usize,
}

impl Default for MillConfig {
    fn default() -> Self {
        Self {
            workers: vec![
                WorkerConfig {
                    id: "w1".to_string(),
                    num_threads: 8,
                },
                WorkerConfig {
                    id: "w2".to_string(),
                    num_threads: 2,
                },
            ],
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            default_thread_demand: DEFAULT_THREAD_DEMAND,
        }
    }
}

impl MillConfig {
    pub fn new(workers: Vec<WorkerConfig>) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_worker(mut self, id: impl Into<String>, num_threads: usize) -> Self {
        self.workers.push(WorkerConfig {
            id: id.into(),
            num_threads,
        });
        self
    }
}
