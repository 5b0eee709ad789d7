use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Run policy of a job or rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    Always,
    Delayed,
    Manual,
    Never,
    OnFailure,
    #[default]
    OnSuccess,
}

/// Conditional execution predicate attached to a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    #[serde(default)]
    when: When,
    #[serde(default)]
    allow_failure: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exists: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    variables: IndexMap<String, String>,
}

impl Rule {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: Some(condition.into()),
            ..Self::default()
        }
    }

    /// A rule without condition; matches every pipeline.
    pub fn unconditional() -> Self {
        Self::default()
    }

    pub fn with_when(mut self, when: When) -> Self {
        self.when = when;
        self
    }

    pub fn with_allow_failure(mut self, allow_failure: bool) -> Self {
        self.allow_failure = allow_failure;
        self
    }

    pub fn with_changes<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changes.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_exists<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exists.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Copy of this rule that prevents the job from running when it matches.
    pub fn never(&self) -> Self {
        Self {
            when: When::Never,
            ..self.clone()
        }
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn when(&self) -> When {
        self.when
    }

    pub fn allow_failure(&self) -> bool {
        self.allow_failure
    }
}
