//! Saga definitions and the registry that resolves them by name.

use std::collections::HashMap;

use crate::error::SagaError;

/// A named saga and its ordered step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaDefinition {
    name: String,
    steps: Vec<String>,
}

impl SagaDefinition {
    pub fn new(
        name: impl Into<String>,
        steps: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn first_step(&self) -> Option<&str> {
        self.steps.first().map(String::as_str)
    }

    pub fn contains_step(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s == step)
    }

    /// The step immediately after `step`, if any.
    ///
    /// `None` for the final step and for steps the definition does not
    /// contain.
    pub fn successor(&self, step: &str) -> Option<&str> {
        let index = self.steps.iter().position(|s| s == step)?;
        self.steps.get(index + 1).map(String::as_str)
    }
}

/// Lookup table from saga name to definition.
///
/// The orchestrator consults it on every transition so an instance can
/// only ever move to the immediate successor of its current step.
#[derive(Debug, Default)]
pub struct SagaRegistry {
    definitions: HashMap<String, SagaDefinition>,
}

impl SagaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, definition: SagaDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn register(&mut self, definition: SagaDefinition) {
        self.definitions
            .insert(definition.name().to_string(), definition);
    }

    pub fn get(&self, name: &str) -> Result<&SagaDefinition, SagaError> {
        self.definitions
            .get(name)
            .ok_or_else(|| SagaError::UnknownSaga {
                name: name.to_string(),
            })
    }
}
