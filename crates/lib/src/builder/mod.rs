//! Builder contract and registry.
//!
//! A builder is a named transformation from an `Input` value to an `Output`
//! value. While it runs it declares what it read (`require`), what other builds
//! it needs (`require_build`) and what it wrote (`provide`) through its
//! [`BuildContext`]; the build manager persists those declarations and uses
//! them to decide whether the next request for the same input must re-run.
//!
//! # Submodules
//!
//! - [`context`] - the capability handed to a running builder body
//! - [`request`] - request values and their keys

pub mod context;
pub mod request;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::manager::{BuildError, BuilderError};

pub use context::BuildContext;
pub use request::{BuildRequest, RequestKey};

/// A kind of build step.
///
/// Implementations are plain values registered once in a [`BuilderRegistry`];
/// everything that varies per execution lives in `Input`.
pub trait Builder {
  /// Stable name, used to find the builder again when a persisted unit names it.
  const ID: &'static str;

  type Input: Serialize + DeserializeOwned;
  type Output: Serialize + DeserializeOwned;

  /// Human-readable summary of what building `input` does.
  fn description(&self, input: &Self::Input) -> String;

  /// Where the unit for this request lives, relative to the unit store.
  fn persistent_location(&self, key: &RequestKey, _input: &Self::Input) -> PathBuf {
    PathBuf::from(Self::ID).join(format!("{}.json", key))
  }

  fn build(&self, input: &Self::Input, ctx: &mut BuildContext<'_, '_>) -> Result<Self::Output, BuilderError>;
}

/// Object-safe view of a [`Builder`] over JSON values.
///
/// The build manager only ever holds this capability; it never sees concrete
/// builder types.
pub trait DynBuilder {
  fn id(&self) -> &'static str;

  fn description(&self, input: &Value) -> Result<String, BuildError>;

  fn persistent_location(&self, key: &RequestKey, input: &Value) -> Result<PathBuf, BuildError>;

  fn build(&self, input: &Value, ctx: &mut BuildContext<'_, '_>) -> Result<Value, BuilderError>;
}

fn decode<B: Builder>(input: &Value) -> Result<B::Input, BuildError> {
  Ok(serde_json::from_value(input.clone())?)
}

impl<B: Builder> DynBuilder for B {
  fn id(&self) -> &'static str {
    B::ID
  }

  fn description(&self, input: &Value) -> Result<String, BuildError> {
    Ok(Builder::description(self, &decode::<B>(input)?))
  }

  fn persistent_location(&self, key: &RequestKey, input: &Value) -> Result<PathBuf, BuildError> {
    Ok(Builder::persistent_location(self, key, &decode::<B>(input)?))
  }

  fn build(&self, input: &Value, ctx: &mut BuildContext<'_, '_>) -> Result<Value, BuilderError> {
    let input = decode::<B>(input)?;
    let output = Builder::build(self, &input, ctx)?;
    Ok(serde_json::to_value(output)?)
  }
}

/// The table of builder kinds known to this process.
///
/// Constructed at start-up and passed by reference to the build manager.
#[derive(Default)]
pub struct BuilderRegistry {
  builders: BTreeMap<&'static str, Box<dyn DynBuilder>>,
}

impl BuilderRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a builder kind. Each id may be registered once.
  pub fn register<B: Builder + 'static>(&mut self, builder: B) -> Result<&mut Self, BuildError> {
    if self.builders.contains_key(B::ID) {
      return Err(BuildError::DuplicateBuilder(B::ID.to_string()));
    }
    self.builders.insert(B::ID, Box::new(builder));
    Ok(self)
  }

  pub fn get(&self, id: &str) -> Result<&dyn DynBuilder, BuildError> {
    self
      .builders
      .get(id)
      .map(|b| b.as_ref())
      .ok_or_else(|| BuildError::UnknownBuilder(id.to_string()))
  }
}

impl std::fmt::Debug for BuilderRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_list().entries(self.builders.keys()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Serialize, Deserialize)]
  struct ModuleInput {
    module: String,
  }

  struct Describe;

  impl Builder for Describe {
    const ID: &'static str = "describe";
    type Input = ModuleInput;
    type Output = ();

    fn description(&self, input: &ModuleInput) -> String {
      format!("Describe {}", input.module)
    }

    fn build(&self, _input: &ModuleInput, _ctx: &mut BuildContext<'_, '_>) -> Result<(), BuilderError> {
      Ok(())
    }
  }

  #[test]
  fn registry_looks_up_by_id() {
    let mut registry = BuilderRegistry::new();
    registry.register(Describe).unwrap();

    let builder = registry.get("describe").unwrap();
    assert_eq!(builder.id(), "describe");
    assert_eq!(
      builder.description(&json!({ "module": "Entity" })).unwrap(),
      "Describe Entity"
    );
  }

  #[test]
  fn duplicate_registration_is_rejected() {
    let mut registry = BuilderRegistry::new();
    registry.register(Describe).unwrap();

    assert!(matches!(
      registry.register(Describe),
      Err(BuildError::DuplicateBuilder(id)) if id == "describe"
    ));
  }

  #[test]
  fn unknown_builder_is_an_error() {
    let registry = BuilderRegistry::new();
    assert!(matches!(registry.get("sdf2table"), Err(BuildError::UnknownBuilder(_))));
  }

  #[test]
  fn malformed_input_fails_to_decode() {
    let mut registry = BuilderRegistry::new();
    registry.register(Describe).unwrap();

    let err = registry.get("describe").unwrap().description(&json!({ "mod": 1 }));
    assert!(matches!(err, Err(BuildError::Serialize(_))));
  }

  #[test]
  fn default_location_is_per_builder_directory() {
    let key = RequestKey(crate::util::hash::ObjectHash("abc".to_string()));
    let input = ModuleInput {
      module: "Entity".to_string(),
    };
    assert_eq!(
      Builder::persistent_location(&Describe, &key, &input),
      PathBuf::from("describe/abc.json")
    );
  }
}
