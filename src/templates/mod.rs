//! Built-in pipeline templates

use crate::core::Pipeline;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN: &[(&str, &str)] = &[
    ("research-summary", include_str!("builtin/research-summary.yaml")),
    ("token-risk-assessment", include_str!("builtin/token-risk-assessment.yaml")),
    ("content-generation", include_str!("builtin/content-generation.yaml")),
];

/// Named pipeline definitions, keyed by pipeline id
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Pipeline>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library preloaded with the embedded templates
    pub fn builtin() -> Result<Self> {
        let mut library = Self::new();
        for (name, yaml) in BUILTIN {
            let pipeline = Pipeline::from_yaml(yaml)
                .with_context(|| format!("Failed to parse built-in template {}", name))?;
            library.register(pipeline);
        }
        Ok(library)
    }

    /// Add every `.yaml`, `.yml` and `.json` pipeline in a directory
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read template directory {}", dir.display()))?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry?.path();
            let is_pipeline = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml" | "json")
            );
            if is_pipeline {
                self.register(Pipeline::from_file(&path)?);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Add a template; replaces one with the same id
    pub fn register(&mut self, pipeline: Pipeline) {
        self.templates.insert(pipeline.id.clone(), pipeline);
    }

    pub fn get(&self, id: &str) -> Option<&Pipeline> {
        self.templates.get(id)
    }

    /// All templates, sorted by id
    pub fn list(&self) -> Vec<&Pipeline> {
        self.templates.values().collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Pipeline> {
        self.templates
            .values()
            .filter(|p| {
                p.metadata
                    .as_ref()
                    .and_then(|m| m.category.as_deref())
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            })
            .collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Pipeline> {
        self.templates
            .values()
            .filter(|p| {
                p.metadata
                    .as_ref()
                    .is_some_and(|m| m.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
