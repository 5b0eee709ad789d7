use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::pipeline::{JobId, SequenceId};

const DEFAULT_REMOTE_REF: &str = "main";

/// Explicit dependency edge to another job, possibly in another project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Need {
    job: String,
    artifacts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    git_ref: Option<String>,
}

impl Need {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            artifacts: true,
            project: None,
            git_ref: None,
        }
    }

    /// Need on a job of another project. `git_ref` defaults to `main`.
    pub fn remote(
        job: impl Into<String>,
        project: impl Into<String>,
        git_ref: Option<String>,
    ) -> Self {
        Self {
            job: job.into(),
            artifacts: true,
            project: Some(project.into()),
            git_ref: Some(git_ref.unwrap_or_else(|| DEFAULT_REMOTE_REF.to_string())),
        }
    }

    /// Validating constructor for loosely typed input.
    pub fn from_parts(
        job: impl Into<String>,
        project: Option<String>,
        git_ref: Option<String>,
        artifacts: bool,
    ) -> Result<Self> {
        let job = job.into();
        let need = match (project, git_ref) {
            (None, Some(git_ref)) => {
                return Err(PipelineError::RefWithoutProject { job, git_ref });
            }
            (Some(project), git_ref) => Self::remote(job, project, git_ref),
            (None, None) => Self::new(job),
        };
        Ok(need.with_artifacts(artifacts))
    }

    pub fn with_artifacts(mut self, artifacts: bool) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn git_ref(&self) -> Option<&str> {
        self.git_ref.as_deref()
    }

    pub fn artifacts(&self) -> bool {
        self.artifacts
    }
}

/// Target of a `needs` or `dependencies` entry.
///
/// Job and sequence references are expanded at render time into one [`Need`]
/// per composed name the target takes in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeedRef {
    Need(Need),
    Job(JobId),
    Sequence(SequenceId),
}

impl From<Need> for NeedRef {
    fn from(need: Need) -> Self {
        Self::Need(need)
    }
}

impl From<JobId> for NeedRef {
    fn from(id: JobId) -> Self {
        Self::Job(id)
    }
}

impl From<SequenceId> for NeedRef {
    fn from(id: SequenceId) -> Self {
        Self::Sequence(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_need_defaults_to_main() {
        let need = Need::remote("build", "group/project", None);
        assert_eq!(need.git_ref(), Some("main"));
        assert!(need.artifacts());
    }

    #[test]
    fn ref_requires_project() {
        let err = Need::from_parts("build", None, Some("develop".into()), true);
        assert!(matches!(err, Err(PipelineError::RefWithoutProject { .. })));
    }

    #[test]
    fn renders_job_before_project() {
        let need = Need::from_parts("build", Some("group/project".into()), None, false).unwrap();
        assert_eq!(
            serde_yaml::to_string(&need).unwrap(),
            "job: build\nartifacts: false\nproject: group/project\nref: main\n"
        );
    }
}
