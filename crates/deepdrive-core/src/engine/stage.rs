use super::error::EngineError;
use super::managers::TaskManager;
use crate::core::models::task::TaskDescriptor;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// The four stage-types of a round, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StageKind {
    Simulate,
    Preprocess,
    Learn,
    Detect,
}

impl StageKind {
    pub const ORDER: [StageKind; 4] = [
        StageKind::Simulate,
        StageKind::Preprocess,
        StageKind::Learn,
        StageKind::Detect,
    ];

    pub fn default_name(self) -> &'static str {
        match self {
            StageKind::Simulate => "MD",
            StageKind::Preprocess => "Preprocess",
            StageKind::Learn => "ML",
            StageKind::Detect => "Outlier",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageKind::Simulate => "simulate",
            StageKind::Preprocess => "preprocess",
            StageKind::Learn => "learn",
            StageKind::Detect => "detect",
        };
        f.write_str(label)
    }
}

/// Display names of the stages, as shown in logs and handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNames {
    pub simulate: String,
    pub preprocess: String,
    pub learn: String,
    pub detect: String,
}

impl StageNames {
    pub fn name(&self, kind: StageKind) -> &str {
        match kind {
            StageKind::Simulate => &self.simulate,
            StageKind::Preprocess => &self.preprocess,
            StageKind::Learn => &self.learn,
            StageKind::Detect => &self.detect,
        }
    }
}

impl Default for StageNames {
    fn default() -> Self {
        Self {
            simulate: StageKind::Simulate.default_name().to_string(),
            preprocess: StageKind::Preprocess.default_name().to_string(),
            learn: StageKind::Learn.default_name().to_string(),
            detect: StageKind::Detect.default_name().to_string(),
        }
    }
}

/// A stage-type together with the managers assigned to it for one round.
pub struct StageDescriptor<'a> {
    pub kind: StageKind,
    pub name: &'a str,
    pub managers: Vec<&'a dyn TaskManager>,
}

impl fmt::Debug for StageDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.managers.iter().map(|m| m.name()).collect();
        f.debug_struct("StageDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("managers", &names)
            .finish()
    }
}

impl StageDescriptor<'_> {
    /// Collects the task descriptors of every assigned manager, in manager order.
    ///
    /// The first manager failure aborts generation; nothing of the stage is returned.
    pub fn generate(&self, round: usize) -> Result<Stage, EngineError> {
        let mut tasks = Vec::new();
        for manager in &self.managers {
            let produced = manager.produce(round)?;
            debug!(
                manager = manager.name(),
                stage = self.name,
                round,
                count = produced.len(),
                "Manager produced tasks."
            );
            tasks.extend(produced);
        }
        Ok(Stage {
            kind: self.kind,
            name: self.name.to_string(),
            round,
            tasks,
        })
    }
}

/// The generated work of one stage-type for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub kind: StageKind,
    pub name: String,
    pub round: usize,
    pub tasks: Vec<TaskDescriptor>,
}

impl Stage {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::output::Inputs;

    struct FixedManager {
        name: String,
        count: usize,
        inputs: Inputs,
    }

    impl TaskManager for FixedManager {
        fn name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> StageKind {
            StageKind::Learn
        }
        fn produce(&self, round: usize) -> Result<Vec<TaskDescriptor>, EngineError> {
            Ok((0..self.count)
                .map(|i| {
                    TaskDescriptor::builder(format!("{}-{}-{}", self.name, round, i), "true")
                        .build()
                })
                .collect())
        }
        fn inputs(&self) -> &Inputs {
            &self.inputs
        }
        fn set_inputs(&mut self, inputs: Inputs) {
            self.inputs = inputs;
        }
    }

    fn manager(name: &str, count: usize) -> FixedManager {
        FixedManager {
            name: name.into(),
            count,
            inputs: Inputs::new(),
        }
    }

    #[test]
    fn generate_collects_tasks_of_all_managers_in_order() {
        let a = manager("A", 2);
        let b = manager("B", 1);
        let descriptor = StageDescriptor {
            kind: StageKind::Learn,
            name: "ML",
            managers: vec![&a, &b],
        };

        let stage = descriptor.generate(3).unwrap();
        let names: Vec<&str> = stage.tasks.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["A-3-0", "A-3-1", "B-3-0"]);
        assert_eq!(stage.round, 3);
        assert_eq!(stage.name, "ML");
    }

    #[test]
    fn stage_without_managers_is_empty() {
        let descriptor = StageDescriptor {
            kind: StageKind::Preprocess,
            name: "Preprocess",
            managers: Vec::new(),
        };
        assert!(descriptor.generate(0).unwrap().is_empty());
    }

    #[test]
    fn default_names_follow_stage_order() {
        let names = StageNames::default();
        let ordered: Vec<&str> = StageKind::ORDER.iter().map(|k| names.name(*k)).collect();
        assert_eq!(ordered, vec!["MD", "Preprocess", "ML", "Outlier"]);
    }
}
