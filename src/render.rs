//! Document handed to the CI orchestrator.

use indexmap::IndexMap;
use serde::Serialize;

use crate::cache::{CacheWhen, RenderedCache};
use crate::env::CiEnvironment;
use crate::image::{RenderedImage, Service};
use crate::include::Include;
use crate::job::{Job, JobKind, RenderedTrigger};
use crate::need::Need;
use crate::rule::{Rule, When};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineDocument {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<Include>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    pub stages: Vec<String>,
    #[serde(flatten)]
    pub jobs: IndexMap<String, RenderedJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<CacheWhen>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedJob {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<RenderedTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<RenderedImage>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs: Option<Vec<Need>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<RenderedArtifacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<RenderedCache>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<When>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_failure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
}

impl RenderedJob {
    /// Renders a resolved job. Needs and dependencies arrive already expanded
    /// into job names of the pipeline.
    pub fn from_job(
        job: &Job,
        needs: Option<Vec<Need>>,
        dependencies: Option<Vec<String>>,
        env: &CiEnvironment,
    ) -> Self {
        let mut rendered = Self {
            stage: job.stage().to_string(),
            script: None,
            trigger: None,
            image: None,
            variables: job.variables().clone(),
            rules: job.rules().to_vec(),
            needs,
            dependencies,
            artifacts: None,
            cache: None,
            tags: Vec::new(),
            when: job.when(),
            allow_failure: job.allow_failure(),
            timeout: job.timeout().map(str::to_string),
            retry: job.retry(),
            resource_group: job.resource_group().map(str::to_string),
        };

        match job.kind() {
            JobKind::Trigger(trigger) => rendered.trigger = Some(trigger.render()),
            JobKind::Script(script) => {
                rendered.script = Some(script.clone());
                rendered.image = job.image().map(|image| image.render());
                rendered.tags = job.tags().iter().cloned().collect();
                rendered.cache = job.cache().map(|cache| cache.render(env));
                let artifacts = job.artifacts();
                if !artifacts.paths.is_empty()
                    || artifacts.name.is_some()
                    || artifacts.expire_in.is_some()
                    || artifacts.when.is_some()
                {
                    rendered.artifacts = Some(RenderedArtifacts {
                        name: artifacts.name.clone(),
                        paths: artifacts.paths.iter().cloned().collect(),
                        expire_in: artifacts.expire_in.clone(),
                        when: artifacts.when,
                    });
                }
            }
        }

        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;

    #[test]
    fn script_job_renders_attributes_in_order() {
        let mut job = Job::new("build", ["docker build ."]).unwrap();
        job.set_image(Image::new("docker").with_tag("27"))
            .add_variables([("DOCKER_TLS_CERTDIR", "/certs")])
            .add_tags(["docker"])
            .add_artifact_paths(["dist"])
            .set_artifacts_expire_in("1 week");
        let rendered = RenderedJob::from_job(&job, None, None, &CiEnvironment::default());
        assert_eq!(
            serde_yaml::to_string(&rendered).unwrap(),
            "stage: build\n\
             script:\n- docker build .\n\
             image:\n  name: docker:27\n\
             variables:\n  DOCKER_TLS_CERTDIR: /certs\n\
             artifacts:\n  paths:\n  - dist\n  expire_in: 1 week\n\
             tags:\n- docker\n"
        );
    }
}
