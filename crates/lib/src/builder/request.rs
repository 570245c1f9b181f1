use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::hash::{Hashable, ObjectHash};

use super::Builder;

/// Stable identity of a build request, used to address its persisted unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestKey(pub ObjectHash);

impl std::fmt::Display for RequestKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A builder name paired with a structural input value.
///
/// Inputs are kept as JSON values so requests compare structurally and can be
/// written into the units of the builders that required them. The registry
/// turns the name back into a builder when a persisted unit is re-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
  pub builder: String,
  pub input: Value,
}

impl Hashable for BuildRequest {}

impl BuildRequest {
  pub fn new<B: Builder>(input: &B::Input) -> Result<Self, serde_json::Error> {
    Ok(Self {
      builder: B::ID.to_string(),
      input: serde_json::to_value(input)?,
    })
  }

  pub fn key(&self) -> Result<RequestKey, serde_json::Error> {
    self.compute_hash().map(RequestKey)
  }
}
