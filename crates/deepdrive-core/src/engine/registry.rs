//! Wiring between task managers.
//!
//! A consumer subscribes to producers once, before round 0; its input map then holds the
//! producers' output records keyed by producer name.

use super::managers::TaskManager;
use super::stage::StageKind;
use crate::core::models::output::Inputs;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RegistryError {
    #[error("Manager name '{name}' is not unique")]
    DuplicateName { name: String },
    #[error("Manager '{name}' cannot subscribe to itself")]
    SelfSubscription { name: String },
    #[error("No manager named '{name}' is registered")]
    UnknownManager { name: String },
    #[error("Manager '{name}' would write the same artifacts as '{existing}'")]
    SharedArtifacts { name: String, existing: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub producer: String,
    pub consumer: String,
}

/// Checks a producer name list for `consumer`. A list naming the consumer is always a
/// self-subscription, even when it also repeats a name.
fn validate_subscription(consumer: &str, producers: &[&str]) -> Result<(), RegistryError> {
    if producers.contains(&consumer) {
        return Err(RegistryError::SelfSubscription {
            name: consumer.to_string(),
        });
    }
    let mut seen = HashSet::with_capacity(producers.len());
    for name in producers {
        if !seen.insert(*name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Replaces `consumer`'s inputs with the current outputs of `producers`.
pub fn subscribe(
    consumer: &mut dyn TaskManager,
    producers: &[&dyn TaskManager],
) -> Result<Vec<DependencyEdge>, RegistryError> {
    let names: Vec<&str> = producers.iter().map(|p| p.name()).collect();
    validate_subscription(consumer.name(), &names)?;

    let inputs: Inputs = producers
        .iter()
        .map(|p| (p.name().to_string(), p.output()))
        .collect();
    let edges = names
        .iter()
        .map(|producer| DependencyEdge {
            producer: producer.to_string(),
            consumer: consumer.name().to_string(),
        })
        .collect();
    consumer.set_inputs(inputs);
    Ok(edges)
}

/// Owns every manager of a run together with the subscriptions between them.
#[derive(Default)]
pub struct ManagerGraph {
    managers: Vec<Box<dyn TaskManager>>,
    edges: Vec<DependencyEdge>,
}

impl ManagerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a manager. Two managers of one stage-type must not share artifact
    /// directories, since their task ids both start at 0.
    pub fn add(&mut self, manager: Box<dyn TaskManager>) -> Result<(), RegistryError> {
        if self.get(manager.name()).is_some() {
            return Err(RegistryError::DuplicateName {
                name: manager.name().to_string(),
            });
        }
        let output = manager.output();
        if !output.is_empty() {
            if let Some(existing) = self
                .managers
                .iter()
                .find(|m| m.kind() == manager.kind() && m.output() == output)
            {
                return Err(RegistryError::SharedArtifacts {
                    name: manager.name().to_string(),
                    existing: existing.name().to_string(),
                });
            }
        }
        self.managers.push(manager);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn TaskManager> {
        self.managers
            .iter()
            .find(|m| m.name() == name)
            .map(|m| &**m)
    }

    fn position(&self, name: &str) -> Result<usize, RegistryError> {
        self.managers
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| RegistryError::UnknownManager {
                name: name.to_string(),
            })
    }

    /// Subscribes `consumer` to the named producers, replacing any earlier subscription.
    pub fn subscribe(&mut self, consumer: &str, producers: &[&str]) -> Result<(), RegistryError> {
        let consumer_index = self.position(consumer)?;
        validate_subscription(consumer, producers)?;

        let mut inputs = Inputs::new();
        for name in producers {
            let producer = &self.managers[self.position(name)?];
            inputs.insert(name.to_string(), producer.output());
        }

        self.managers[consumer_index].set_inputs(inputs);
        self.edges.retain(|edge| edge.consumer != consumer);
        self.edges
            .extend(producers.iter().map(|producer| DependencyEdge {
                producer: producer.to_string(),
                consumer: consumer.to_string(),
            }));
        debug!(consumer, ?producers, "Subscription registered.");
        Ok(())
    }

    /// Managers of one stage-type, in insertion order.
    pub fn managers_for(&self, kind: StageKind) -> Vec<&dyn TaskManager> {
        self.managers
            .iter()
            .filter(|m| m.kind() == kind)
            .map(|m| &**m)
            .collect()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
