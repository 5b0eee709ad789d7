//! Predefined CI variables used as defaults while rendering.
//!
//! Values are read once from the process environment. When the generator runs
//! outside of a pipeline the variable is rendered as a `${NAME}` reference so the
//! orchestrator expands it at job runtime instead.

use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiEnvironment {
    pub commit_ref_slug: String,
    pub project_dir: String,
}

impl Default for CiEnvironment {
    fn default() -> Self {
        Self {
            commit_ref_slug: reference("CI_COMMIT_REF_SLUG"),
            project_dir: reference("CI_PROJECT_DIR"),
        }
    }
}

impl CiEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the environment from an arbitrary lookup, falling back to runtime
    /// references for missing or empty values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| reference(name))
        };
        Self {
            commit_ref_slug: read("CI_COMMIT_REF_SLUG"),
            project_dir: read("CI_PROJECT_DIR"),
        }
    }

    pub fn with_commit_ref_slug(mut self, slug: impl Into<String>) -> Self {
        self.commit_ref_slug = slug.into();
        self
    }

    pub fn with_project_dir(mut self, dir: impl Into<String>) -> Self {
        self.project_dir = dir.into();
        self
    }
}

fn reference(name: &str) -> String {
    format!("${{{name}}}")
}
