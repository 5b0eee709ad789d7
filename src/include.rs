use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PipelineError, Result};

/// Reference to an external configuration fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Include {
    Local {
        local: String,
    },
    File {
        file: String,
        project: String,
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,
    },
    Remote {
        remote: Url,
    },
    Template {
        template: String,
    },
    /// Configuration produced as an artifact by a job of the parent pipeline.
    Artifact {
        job: String,
        artifact: String,
    },
}

impl Include {
    pub fn local(path: impl Into<String>) -> Self {
        Self::Local { local: path.into() }
    }

    pub fn file(file: impl Into<String>, project: impl Into<String>, git_ref: Option<String>) -> Self {
        Self::File {
            file: file.into(),
            project: project.into(),
            git_ref,
        }
    }

    pub fn remote(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|err| PipelineError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let include = Self::Remote { remote: parsed };
        include.validate()?;
        Ok(include)
    }

    pub fn template(name: impl Into<String>) -> Self {
        Self::Template {
            template: name.into(),
        }
    }

    pub fn artifact(job: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::Artifact {
            job: job.into(),
            artifact: artifact.into(),
        }
    }

    /// Checks constraints the type system does not cover, for includes that
    /// were deserialized rather than built through the constructors.
    pub fn validate(&self) -> Result<()> {
        if let Self::Remote { remote } = self {
            if !matches!(remote.scheme(), "http" | "https") {
                return Err(PipelineError::InvalidUrl {
                    url: remote.to_string(),
                    reason: format!("unsupported scheme '{}'", remote.scheme()),
                });
            }
            if remote.host_str().is_none_or(str::is_empty) {
                return Err(PipelineError::InvalidUrl {
                    url: remote.to_string(),
                    reason: "missing host".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_requires_well_formed_url() {
        assert!(Include::remote("https://example.com/ci/base.yml").is_ok());
        assert!(matches!(
            Include::remote("not a url"),
            Err(PipelineError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Include::remote("file:///etc/ci.yml"),
            Err(PipelineError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn variants_render_their_own_keys() {
        let includes = vec![
            Include::local("ci/common.yml"),
            Include::file("templates/build.yml", "group/ci", Some("v2".into())),
            Include::template("Security/SAST.gitlab-ci.yml"),
            Include::artifact("generate", "child.yml"),
        ];
        let rendered = serde_yaml::to_string(&includes).unwrap();
        assert_eq!(
            rendered,
            "- local: ci/common.yml\n\
             - file: templates/build.yml\n  project: group/ci\n  ref: v2\n\
             - template: Security/SAST.gitlab-ci.yml\n\
             - job: generate\n  artifact: child.yml\n"
        );
    }

    #[test]
    fn deserializes_by_shape() {
        let include: Include = serde_yaml::from_str("remote: https://example.com/a.yml").unwrap();
        assert!(matches!(include, Include::Remote { .. }));
        let include: Include = serde_yaml::from_str("local: a.yml").unwrap();
        assert_eq!(include, Include::local("a.yml"));
    }
}
