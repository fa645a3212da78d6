// Static per-model capability descriptors

use crate::core::models::ModelType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model capabilities information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub model_type: ModelType,
    pub max_tokens: u32,
    pub supported_languages: Vec<String>,
    pub specializations: Vec<String>,
    pub description: String,
}

impl ModelCapabilities {
    fn new(
        model_type: ModelType,
        max_tokens: u32,
        languages: &[&str],
        specializations: &[&str],
        description: &str,
    ) -> Self {
        Self {
            model_type,
            max_tokens,
            supported_languages: languages.iter().map(|s| s.to_string()).collect(),
            specializations: specializations.iter().map(|s| s.to_string()).collect(),
            description: description.to_string(),
        }
    }
}

/// Read-only capability table keyed by model type
///
/// Built once at startup and shared behind an `Arc`; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    entries: HashMap<ModelType, ModelCapabilities>,
}

impl CapabilityRegistry {
    /// Registry with the descriptors of the built-in models
    pub fn builtin() -> Self {
        Self::from_entries(vec![
            ModelCapabilities::new(
                ModelType::Aiden7b,
                4096,
                &["python", "javascript", "java", "cpp", "rust", "go"],
                &["general_coding", "code_generation", "debugging"],
                "General-purpose 7B parameter model for code generation and debugging",
            ),
            ModelCapabilities::new(
                ModelType::Codegen,
                8192,
                &["python", "javascript", "typescript", "java", "cpp", "c", "rust", "go"],
                &["code_generation", "boilerplate", "algorithms", "data_structures"],
                "Specialized model optimized for code generation tasks",
            ),
            ModelCapabilities::new(
                ModelType::Debugger,
                6144,
                &["python", "javascript", "java", "cpp", "rust"],
                &["debugging", "error_analysis", "code_review", "optimization"],
                "Specialized model for debugging and code analysis tasks",
            ),
        ])
    }

    pub fn from_entries(entries: Vec<ModelCapabilities>) -> Self {
        Self {
            entries: entries.into_iter().map(|c| (c.model_type, c)).collect(),
        }
    }

    pub fn get(&self, model: ModelType) -> Option<&ModelCapabilities> {
        self.entries.get(&model)
    }

    /// All descriptors, in `ModelType::ALL` order
    pub fn all(&self) -> Vec<&ModelCapabilities> {
        ModelType::ALL.iter().filter_map(|m| self.entries.get(m)).collect()
    }
}
