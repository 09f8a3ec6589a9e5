use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// A fitted disease class: its encoded index and its display name.
///
/// The name is what callers use to look diseases up in an external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiseaseLabel {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Maps encoded class indices back to disease names.
#[derive(Debug, Clone, Serialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(FlowError::invalid("label_encoder", "no classes"));
        }
        let mut seen = HashSet::with_capacity(classes.len());
        for class in &classes {
            if !seen.insert(class.as_str()) {
                return Err(FlowError::invalid(
                    "label_encoder",
                    format!("duplicate class '{class}'"),
                ));
            }
        }
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn label(&self, index: usize) -> Option<DiseaseLabel> {
        self.classes.get(index).map(|name| DiseaseLabel {
            index,
            name: name.clone(),
        })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == name)
    }
}
