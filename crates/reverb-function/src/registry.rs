use std::collections::HashMap;

use tracing::debug;

use crate::error::RegistryError;
use crate::function::FunctionDescriptor;

/// Collects functions at startup.
///
/// Consumed by [`RegistryBuilder::build`]; the resulting registry cannot be
/// modified.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
  functions: HashMap<String, FunctionDescriptor>,
}

impl RegistryBuilder {
  /// Register a function under a method name.
  pub fn register(
    &mut self,
    name: impl Into<String>,
    descriptor: FunctionDescriptor,
  ) -> Result<&mut Self, RegistryError> {
    let name = name.into();
    if self.functions.contains_key(&name) {
      return Err(RegistryError::DuplicateRegistration { name });
    }

    debug!(method = %name, function_id = %descriptor.id, event = %descriptor.event, "function_registered");
    self.functions.insert(name, descriptor);
    Ok(self)
  }

  pub fn build(self) -> FunctionRegistry {
    FunctionRegistry {
      functions: self.functions,
    }
  }
}

/// Immutable mapping from method name to function.
///
/// Safe to share between threads without synchronization.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
  functions: HashMap<String, FunctionDescriptor>,
}

impl FunctionRegistry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::default()
  }

  /// Look up a function by method name.
  pub fn lookup(&self, name: &str) -> Option<&FunctionDescriptor> {
    self.functions.get(name)
  }

  /// Method names of all functions triggered by `event_name`, sorted.
  pub fn triggered_by(&self, event_name: &str) -> Vec<&str> {
    let mut names: Vec<&str> = self
      .functions
      .iter()
      .filter(|(_, descriptor)| descriptor.event == event_name)
      .map(|(name, _)| name.as_str())
      .collect();
    names.sort_unstable();
    names
  }

  /// `(method name, triggering event)` pairs for every registered function.
  pub fn triggers(&self) -> Vec<(String, String)> {
    self
      .functions
      .iter()
      .map(|(name, descriptor)| (name.clone(), descriptor.event.clone()))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.functions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.functions.is_empty()
  }
}
