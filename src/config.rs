//! Configuration of a `MergeView`.
//!
//! ```
//! use brushview::MergeOptions;
//!
//! let options = MergeOptions::from_json(r#"{ "brushed_only": true }"#).unwrap();
//! assert!(options.brushed_only);
//! assert_eq!(options.all_prefix, "__all__");
//! ```

use crate::error::ViewError;
use serde::{Deserialize, Serialize};

/// Header prefix of the all-data measure columns.
pub const ALL_PREFIX: &str = "__all__";

/// Header prefix marking a measure that groups like a dimension.
pub const DISCRETE_PREFIX: &str = "discrete_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeOptions {
    pub all_prefix: String,
    pub discrete_prefix: String,
    /// Hide the all-data rows while the brushed set is non-empty
    pub brushed_only: bool,
    /// Explicit measure flag per brushed column, inferred when absent
    pub measures: Option<Vec<bool>>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            all_prefix: ALL_PREFIX.to_string(),
            discrete_prefix: DISCRETE_PREFIX.to_string(),
            brushed_only: false,
            measures: None,
        }
    }
}

impl MergeOptions {
    pub fn from_json(json: &str) -> Result<Self, ViewError> {
        let options: MergeOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// An empty all-data prefix would give the doubled measures the headers
    /// of the shared ones.
    pub fn validate(&self) -> Result<(), ViewError> {
        if self.all_prefix.is_empty() {
            return Err(ViewError::EmptyPrefix);
        }
        Ok(())
    }

    pub fn with_measures(mut self, measures: Vec<bool>) -> Self {
        self.measures = Some(measures);
        self
    }

    pub fn is_discrete(&self, header: &str) -> bool {
        !self.discrete_prefix.is_empty() && header.starts_with(&self.discrete_prefix)
    }
}
