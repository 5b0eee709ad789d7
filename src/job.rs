use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheWhen};
use crate::error::{PipelineError, Result};
use crate::image::Image;
use crate::include::Include;
use crate::need::NeedRef;
use crate::pipeline::JobId;
use crate::rule::{Rule, When};

/// Stage the orchestrator assigns to jobs that do not declare one.
pub const DEFAULT_STAGE: &str = "test";

const MAX_RETRY: u8 = 2;
const MAX_TRIGGER_INCLUDES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStrategy {
    Depend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TriggerTarget {
    Project {
        project: String,
        branch: Option<String>,
    },
    Includes(Vec<Include>),
}

/// Downstream pipeline started by a trigger job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    target: TriggerTarget,
    strategy: Option<TriggerStrategy>,
}

impl Trigger {
    pub fn project(project: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            target: TriggerTarget::Project {
                project: project.into(),
                branch,
            },
            strategy: None,
        }
    }

    /// Child pipeline assembled from up to three configuration fragments.
    pub fn includes(includes: Vec<Include>) -> Result<Self> {
        if includes.is_empty() || includes.len() > MAX_TRIGGER_INCLUDES {
            return Err(PipelineError::TriggerIncludes {
                count: includes.len(),
            });
        }
        for include in &includes {
            include.validate()?;
        }
        Ok(Self {
            target: TriggerTarget::Includes(includes),
            strategy: None,
        })
    }

    pub fn with_strategy(mut self, strategy: TriggerStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn render(&self) -> RenderedTrigger {
        let (include, project, branch) = match &self.target {
            TriggerTarget::Project { project, branch } => {
                (None, Some(project.clone()), branch.clone())
            }
            TriggerTarget::Includes(includes) => (Some(includes.clone()), None, None),
        };
        RenderedTrigger {
            include,
            project,
            branch,
            strategy: self.strategy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<Include>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<TriggerStrategy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Script(Vec<String>),
    Trigger(Trigger),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub paths: IndexSet<String>,
    pub name: Option<String>,
    pub expire_in: Option<String>,
    pub when: Option<CacheWhen>,
}

/// Leaf unit of work of a pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    name: String,
    stage: String,
    kind: JobKind,
    pub(crate) image: Option<Image>,
    pub(crate) variables: IndexMap<String, String>,
    pub(crate) tags: IndexSet<String>,
    pub(crate) artifacts: Artifacts,
    pub(crate) cache: Option<Cache>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) needs: Option<Vec<NeedRef>>,
    pub(crate) dependencies: Option<Vec<NeedRef>>,
    pub(crate) when: Option<When>,
    pub(crate) allow_failure: Option<bool>,
    pub(crate) timeout: Option<String>,
    pub(crate) retry: Option<u8>,
    pub(crate) resource_group: Option<String>,
    origin: Option<JobId>,
}

#[derive(Debug, Default)]
pub struct JobBuilder {
    name: Option<String>,
    stage: Option<String>,
    script: Vec<String>,
    trigger: Option<Trigger>,
}

impl JobBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn script<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn build(self) -> Result<Job> {
        let name = self.name.filter(|n| !n.is_empty());
        let stage = self.stage.filter(|s| !s.is_empty());
        let (name, stage) = match (name, stage) {
            (Some(name), Some(stage)) => (format!("{name}-{stage}"), stage),
            (None, Some(stage)) => (stage.clone(), stage),
            (Some(name), None) => (name, DEFAULT_STAGE.to_string()),
            (None, None) => return Err(PipelineError::MissingIdentity),
        };
        let name = name.replace('_', "-");
        let stage = stage.replace('-', "_");

        let has_script = self.script.iter().any(|line| !line.trim().is_empty());
        let kind = match self.trigger {
            Some(_) if has_script => return Err(PipelineError::ScriptWithTrigger { job: name }),
            Some(trigger) => JobKind::Trigger(trigger),
            None => {
                if !has_script {
                    return Err(PipelineError::EmptyScript { job: name });
                }
                JobKind::Script(self.script)
            }
        };

        Ok(Job {
            name,
            stage,
            kind,
            image: None,
            variables: IndexMap::new(),
            tags: IndexSet::new(),
            artifacts: Artifacts::default(),
            cache: None,
            rules: Vec::new(),
            needs: None,
            dependencies: None,
            when: None,
            allow_failure: None,
            timeout: None,
            retry: None,
            resource_group: None,
            origin: None,
        })
    }
}

impl Job {
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }

    /// Script job identified by its stage alone.
    pub fn new<I, S>(stage: impl Into<String>, script: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder().stage(stage).script(script).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn script(&self) -> &[String] {
        match &self.kind {
            JobKind::Script(lines) => lines,
            JobKind::Trigger(_) => &[],
        }
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self.kind, JobKind::Trigger(_))
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn needs(&self) -> Option<&[NeedRef]> {
        self.needs.as_deref()
    }

    pub fn dependencies(&self) -> Option<&[NeedRef]> {
        self.dependencies.as_deref()
    }

    pub fn when(&self) -> Option<When> {
        self.when
    }

    pub fn allow_failure(&self) -> Option<bool> {
        self.allow_failure
    }

    pub fn timeout(&self) -> Option<&str> {
        self.timeout.as_deref()
    }

    pub fn retry(&self) -> Option<u8> {
        self.retry
    }

    pub fn resource_group(&self) -> Option<&str> {
        self.resource_group.as_deref()
    }

    /// Arena id of the job this resolved copy was made from.
    pub fn origin(&self) -> Option<JobId> {
        self.origin
    }

    pub fn append_scripts<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let JobKind::Script(script) = &mut self.kind {
            script.extend(lines.into_iter().map(Into::into));
        }
        self
    }

    pub fn prepend_scripts<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let JobKind::Script(script) = &mut self.kind {
            script.splice(0..0, lines.into_iter().map(Into::into));
        }
        self
    }

    pub fn add_variables<I, K, V>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn add_artifact_paths<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts
            .paths
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn set_artifacts_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.artifacts.name = Some(name.into());
        self
    }

    pub fn set_artifacts_expire_in(&mut self, expire_in: impl Into<String>) -> &mut Self {
        self.artifacts.expire_in = Some(expire_in.into());
        self
    }

    pub fn set_artifacts_when(&mut self, when: CacheWhen) -> &mut Self {
        self.artifacts.when = Some(when);
        self
    }

    pub fn set_cache(&mut self, cache: Option<Cache>) -> &mut Self {
        if cache.is_some() {
            self.cache = cache;
        }
        self
    }

    /// Replaces the image. Images with an empty name are ignored.
    pub fn set_image(&mut self, image: impl Into<Image>) -> &mut Self {
        let image = image.into();
        if !image.is_empty() {
            self.image = Some(image);
        }
        self
    }

    pub fn append_rules<I>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.rules.extend(rules);
        self
    }

    pub fn prepend_rules<I>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.rules.splice(0..0, rules);
        self
    }

    pub fn add_needs<I, N>(&mut self, needs: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NeedRef>,
    {
        self.needs
            .get_or_insert_with(Vec::new)
            .extend(needs.into_iter().map(Into::into));
        self
    }

    /// Replaces the needs. An empty list lets the job start immediately.
    pub fn set_needs<I, N>(&mut self, needs: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NeedRef>,
    {
        self.needs = Some(needs.into_iter().map(Into::into).collect());
        self
    }

    pub fn add_dependencies<I, N>(&mut self, dependencies: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NeedRef>,
    {
        self.dependencies
            .get_or_insert_with(Vec::new)
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn set_when(&mut self, when: When) -> &mut Self {
        self.when = Some(when);
        self
    }

    pub fn set_allow_failure(&mut self, allow_failure: bool) -> &mut Self {
        self.allow_failure = Some(allow_failure);
        self
    }

    pub fn set_timeout(&mut self, timeout: impl Into<String>) -> &mut Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn set_retry(&mut self, retry: u8) -> Result<&mut Self> {
        if retry > MAX_RETRY {
            return Err(PipelineError::InvalidRetry { count: retry });
        }
        self.retry = Some(retry);
        Ok(self)
    }

    pub fn set_resource_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.resource_group = Some(group.into());
        self
    }

    /// Independent copy of the job at `id` as it enters a resolution pass.
    pub(crate) fn resolved_copy(&self, id: JobId) -> Self {
        let mut copy = self.clone();
        copy.origin = Some(id);
        copy
    }

    pub(crate) fn extend_name(&mut self, suffix: Option<&str>) {
        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            self.name.push('-');
            self.name.push_str(&suffix.replace('_', "-"));
        }
    }

    /// A stage suffix moves the job into its own stage and renames it.
    pub(crate) fn extend_stage(&mut self, suffix: Option<&str>) {
        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            self.extend_name(Some(suffix));
            self.stage.push('_');
            self.stage.push_str(&suffix.replace('-', "_"));
        }
    }
}
