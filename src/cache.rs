use serde::{Deserialize, Serialize};

use crate::env::CiEnvironment;
use crate::error::{PipelineError, Result};

const PROJECT_DIR_PREFIXES: [&str; 2] = ["${CI_PROJECT_DIR}", "$CI_PROJECT_DIR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWhen {
    Always,
    OnFailure,
    OnSuccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    Pull,
    PullPush,
    Push,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheKey {
    /// Branch slug of the running pipeline.
    #[default]
    Default,
    Key(String),
    Files {
        files: Vec<String>,
        prefix: Option<String>,
    },
}

impl CacheKey {
    pub fn key(key: impl Into<String>) -> Result<Self> {
        let key = key.into().replace("%2F", "-").replace("%2f", "-").replace('/', "-");
        let stripped = key.replace("%2E", "").replace("%2e", "").replace('.', "");
        if stripped.is_empty() {
            return Err(PipelineError::InvalidCacheKey { key });
        }
        Ok(Self::Key(key))
    }

    pub fn files<I, S>(files: I, prefix: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Files {
            files: files.into_iter().map(Into::into).collect(),
            prefix,
        }
    }

    /// Builds a key from optional parts. An explicit key and a file list are
    /// mutually exclusive; neither yields the default branch key. A prefix
    /// needs a file list.
    pub fn from_parts(
        key: Option<String>,
        files: Option<Vec<String>>,
        prefix: Option<String>,
    ) -> Result<Self> {
        match (key, files) {
            (Some(_), Some(_)) => Err(PipelineError::ConflictingCacheKey),
            (None, Some(files)) => Ok(Self::files(files, prefix)),
            (_, None) if prefix.is_some() => Err(PipelineError::PrefixWithoutFiles {
                prefix: prefix.unwrap_or_default(),
            }),
            (Some(key), None) => Self::key(key),
            (None, None) => Ok(Self::Default),
        }
    }

    fn render(&self, env: &CiEnvironment) -> RenderedCacheKey {
        match self {
            Self::Default => RenderedCacheKey::Key(env.commit_ref_slug.clone()),
            Self::Key(key) => RenderedCacheKey::Key(key.clone()),
            Self::Files { files, prefix } => RenderedCacheKey::Files {
                files: files.clone(),
                prefix: prefix.clone(),
            },
        }
    }
}

/// Declarative cache of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cache {
    paths: Vec<String>,
    key: CacheKey,
    untracked: Option<bool>,
    when: Option<CacheWhen>,
    policy: Option<CachePolicy>,
}

impl Cache {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|path| normalize_path(&path.into()))
                .collect(),
            key: CacheKey::Default,
            untracked: None,
            when: None,
            policy: None,
        }
    }

    pub fn with_key(mut self, key: CacheKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_untracked(mut self, untracked: bool) -> Self {
        self.untracked = Some(untracked);
        self
    }

    pub fn with_when(mut self, when: CacheWhen) -> Self {
        self.when = Some(when);
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn key_spec(&self) -> &CacheKey {
        &self.key
    }

    pub fn render(&self, env: &CiEnvironment) -> RenderedCache {
        let project_dir = env.project_dir.trim_end_matches('/');
        let paths = self
            .paths
            .iter()
            .map(|path| {
                let inner = path.trim_start_matches("./");
                match inner.strip_prefix(project_dir.trim_start_matches('/')) {
                    Some(rest) if !project_dir.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                        normalize_path(rest)
                    }
                    _ => path.clone(),
                }
            })
            .collect();
        RenderedCache {
            paths,
            key: self.key.render(env),
            untracked: self.untracked,
            when: self.when,
            policy: self.policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedCacheKey {
    Key(String),
    Files {
        files: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedCache {
    pub paths: Vec<String>,
    pub key: RenderedCacheKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untracked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<CacheWhen>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<CachePolicy>,
}

fn normalize_path(path: &str) -> String {
    let mut relative = path.trim();
    for prefix in PROJECT_DIR_PREFIXES {
        if let Some(rest) = relative.strip_prefix(prefix) {
            relative = rest;
            break;
        }
    }
    let relative = relative
        .trim_start_matches("./")
        .trim_start_matches('/');
    if relative.is_empty() {
        "./".to_string()
    } else {
        format!("./{relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_normalized_relative() {
        let cache = Cache::new(["image", "./target", "$CI_PROJECT_DIR/.venv", "${CI_PROJECT_DIR}"]);
        assert_eq!(cache.paths(), ["./image", "./target", "./.venv", "./"]);
    }

    #[test]
    fn project_dir_is_stripped_at_render() {
        let env = CiEnvironment::default().with_project_dir("/builds/group/project");
        let cache = Cache::new(["/builds/group/project/node_modules"]);
        assert_eq!(cache.render(&env).paths, ["./node_modules"]);
    }

    #[test]
    fn explicit_key_replaces_slashes() {
        assert_eq!(
            CacheKey::key("feature/x%2Fy").unwrap(),
            CacheKey::Key("feature-x-y".into())
        );
    }

    #[test]
    fn dot_only_keys_are_rejected() {
        assert!(matches!(
            CacheKey::key(".."),
            Err(PipelineError::InvalidCacheKey { .. })
        ));
        assert!(matches!(
            CacheKey::key("%2E."),
            Err(PipelineError::InvalidCacheKey { .. })
        ));
    }

    #[test]
    fn key_and_files_are_exclusive() {
        let err = CacheKey::from_parts(Some("k".into()), Some(vec!["Cargo.lock".into()]), None);
        assert!(matches!(err, Err(PipelineError::ConflictingCacheKey)));
        assert_eq!(
            CacheKey::from_parts(None, None, None).unwrap(),
            CacheKey::Default
        );
    }

    #[test]
    fn prefix_requires_files() {
        let err = CacheKey::from_parts(Some("k".into()), None, Some("v1".into()));
        assert!(matches!(err, Err(PipelineError::PrefixWithoutFiles { prefix }) if prefix == "v1"));
        assert!(CacheKey::from_parts(None, None, Some("v1".into())).is_err());
        assert_eq!(
            CacheKey::from_parts(None, Some(vec!["Cargo.lock".into()]), Some("v1".into())).unwrap(),
            CacheKey::files(["Cargo.lock"], Some("v1".into()))
        );
    }

    #[test]
    fn default_key_uses_ref_slug() {
        let env = CiEnvironment::default().with_commit_ref_slug("feature-x");
        let rendered = serde_yaml::to_string(&Cache::new(["image"]).render(&env)).unwrap();
        assert_eq!(rendered, "paths:\n- ./image\nkey: feature-x\n");
    }
}
