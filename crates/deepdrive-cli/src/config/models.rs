use deepdrive::engine::config::RunConfig;
use deepdrive::engine::managers::TaskTemplate;
use deepdrive::engine::managers::detect::DetectSettings;
use deepdrive::engine::managers::learn::LearnSettings;
use deepdrive::engine::managers::simulate::SimulateSettings;

/// Stage-type specific settings of one configured manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerSettings {
    Simulate(SimulateSettings),
    Preprocess,
    Learn(LearnSettings),
    Detect(DetectSettings),
}

/// A fully resolved manager declaration from the run file.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSpec {
    pub name: String,
    pub template: TaskTemplate,
    pub settings: ManagerSettings,
    pub subscribe: Vec<String>,
}

pub struct AppConfig {
    pub core_config: RunConfig,
    pub managers: Vec<ManagerSpec>,
}
