//! YAML description of a pipeline's jobs and sequences.
//!
//! Jobs and sequences are declared once under an id and referenced by that id
//! from `children`, `needs` and `dependencies`, mirroring the arena the
//! [`Pipeline`] builds from them.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::cache::{Cache, CacheKey, CachePolicy, CacheWhen};
use crate::image::Image;
use crate::include::Include;
use crate::job::{Job, Trigger, TriggerStrategy};
use crate::need::{Need, NeedRef};
use crate::pipeline::{JobId, Pipeline, SequenceId};
use crate::rule::{Rule, When};
use crate::sequence::{Node, Sequence, Suffix};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blueprint {
    #[serde(default)]
    pub include: Vec<Include>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub jobs: IndexMap<String, JobSpec>,
    #[serde(default)]
    pub sequences: IndexMap<String, SequenceSpec>,
    #[serde(default)]
    pub pipeline: SequenceSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: Option<String>,
    pub stage: Option<String>,
    #[serde(default)]
    pub script: Vec<String>,
    pub trigger: Option<TriggerSpec>,
    pub image: Option<ImageSpec>,
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub artifacts: Option<ArtifactsSpec>,
    pub cache: Option<CacheSpec>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub needs: Option<Vec<NeedSpec>>,
    pub dependencies: Option<Vec<NeedSpec>>,
    pub when: Option<When>,
    pub allow_failure: Option<bool>,
    pub timeout: Option<String>,
    pub retry: Option<u8>,
    pub resource_group: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSpec {
    pub project: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub include: Vec<Include>,
    pub strategy: Option<TriggerStrategy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImageSpec {
    Name(String),
    Full {
        name: String,
        tag: Option<String>,
        entrypoint: Option<Vec<String>>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactsSpec {
    #[serde(default)]
    pub paths: Vec<String>,
    pub name: Option<String>,
    pub expire_in: Option<String>,
    pub when: Option<CacheWhen>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSpec {
    #[serde(default)]
    pub paths: Vec<String>,
    pub key: Option<String>,
    pub files: Option<Vec<String>>,
    pub prefix: Option<String>,
    pub untracked: Option<bool>,
    pub when: Option<CacheWhen>,
    pub policy: Option<CachePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobReference {
    pub job: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceReference {
    pub sequence: String,
}

/// Need on a job by its rendered name, possibly in another project.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedNeed {
    pub name: String,
    pub project: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default = "default_artifacts")]
    pub artifacts: bool,
}

fn default_artifacts() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NeedSpec {
    Job(JobReference),
    Sequence(SequenceReference),
    Named(NamedNeed),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildSpec {
    pub job: Option<String>,
    pub sequence: Option<String>,
    pub name: Option<String>,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeSpec {
    pub image: Option<ImageSpec>,
    pub variables: Option<IndexMap<String, String>>,
    pub tags: Option<Vec<String>>,
    pub artifacts: Option<Vec<String>>,
    pub cache: Option<CacheSpec>,
    pub rules: Option<Vec<Rule>>,
    pub needs: Option<Vec<NeedSpec>>,
    pub when: Option<When>,
    pub allow_failure: Option<bool>,
    pub timeout: Option<String>,
    pub retry: Option<u8>,
    pub resource_group: Option<String>,
}

impl AttributeSpec {
    pub(crate) fn has_scalars(&self) -> bool {
        self.when.is_some()
            || self.allow_failure.is_some()
            || self.timeout.is_some()
            || self.retry.is_some()
            || self.resource_group.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceSpec {
    #[serde(default)]
    pub children: Vec<ChildSpec>,
    #[serde(default)]
    pub prepend_scripts: Vec<String>,
    #[serde(default)]
    pub append_scripts: Vec<String>,
    #[serde(default)]
    pub prepend_rules: Vec<Rule>,
    #[serde(default)]
    pub initialize: AttributeSpec,
    #[serde(default)]
    pub add: AttributeSpec,
    #[serde(default, rename = "override")]
    pub replace: AttributeSpec,
}

impl Blueprint {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blueprint file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse blueprint YAML: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Builds the pipeline the blueprint describes.
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new();
        for include in &self.include {
            pipeline
                .add_include(include.clone())
                .context("Invalid include")?;
        }
        pipeline.add_services(self.services.iter().map(String::as_str));

        let mut ids = Ids::default();
        for (key, spec) in &self.jobs {
            let job = build_job(spec).with_context(|| format!("Job '{key}'"))?;
            ids.jobs.insert(key.clone(), pipeline.add_job(job));
        }
        for key in self.sequences.keys() {
            ids.sequences
                .insert(key.clone(), pipeline.add_sequence(Sequence::new()));
        }

        for (key, spec) in &self.jobs {
            let id = ids.jobs[key];
            if let Some(needs) = &spec.needs {
                let needs = ids.need_refs(needs).with_context(|| format!("Job '{key}'"))?;
                pipeline[id].set_needs(needs);
            }
            if let Some(dependencies) = &spec.dependencies {
                let dependencies = ids
                    .need_refs(dependencies)
                    .with_context(|| format!("Job '{key}'"))?;
                pipeline[id].add_dependencies(dependencies);
            }
        }

        for (key, spec) in &self.sequences {
            let sequence = build_sequence(spec, &ids)
                .with_context(|| format!("Sequence '{key}'"))?;
            pipeline[ids.sequences[key]] = sequence;
        }
        let root = pipeline.root();
        pipeline[root] = build_sequence(&self.pipeline, &ids).context("Pipeline")?;

        Ok(pipeline)
    }
}

#[derive(Debug, Default)]
struct Ids {
    jobs: HashMap<String, JobId>,
    sequences: HashMap<String, SequenceId>,
}

impl Ids {
    fn job(&self, key: &str) -> Result<JobId> {
        self.jobs
            .get(key)
            .copied()
            .ok_or_else(|| anyhow!("Unknown job '{key}'"))
    }

    fn sequence(&self, key: &str) -> Result<SequenceId> {
        self.sequences
            .get(key)
            .copied()
            .ok_or_else(|| anyhow!("Unknown sequence '{key}'"))
    }

    fn need_refs(&self, specs: &[NeedSpec]) -> Result<Vec<NeedRef>> {
        specs
            .iter()
            .map(|spec| -> Result<NeedRef> {
                Ok(match spec {
                    NeedSpec::Job(reference) => NeedRef::Job(self.job(&reference.job)?),
                    NeedSpec::Sequence(reference) => {
                        NeedRef::Sequence(self.sequence(&reference.sequence)?)
                    }
                    NeedSpec::Named(need) => NeedRef::Need(Need::from_parts(
                        need.name.clone(),
                        need.project.clone(),
                        need.git_ref.clone(),
                        need.artifacts,
                    )?),
                })
            })
            .collect()
    }

    fn child(&self, spec: &ChildSpec) -> Result<Node> {
        match (&spec.job, &spec.sequence) {
            (Some(job), None) => Ok(Node::Job(self.job(job)?)),
            (None, Some(sequence)) => Ok(Node::Sequence(self.sequence(sequence)?)),
            _ => bail!("A child names exactly one of 'job' or 'sequence'"),
        }
    }
}

impl ImageSpec {
    pub fn to_image(&self) -> Image {
        match self {
            Self::Name(name) => Image::new(name.as_str()),
            Self::Full {
                name,
                tag,
                entrypoint,
            } => {
                let mut image = Image::new(name.as_str());
                if let Some(tag) = tag {
                    image = image.with_tag(tag.as_str());
                }
                if let Some(entrypoint) = entrypoint {
                    image = image.with_entrypoint(entrypoint.iter().map(String::as_str));
                }
                image
            }
        }
    }
}

impl CacheSpec {
    pub fn to_cache(&self) -> Result<Cache> {
        let key = CacheKey::from_parts(self.key.clone(), self.files.clone(), self.prefix.clone())?;
        let mut cache = Cache::new(self.paths.iter().map(String::as_str)).with_key(key);
        if let Some(untracked) = self.untracked {
            cache = cache.with_untracked(untracked);
        }
        if let Some(when) = self.when {
            cache = cache.with_when(when);
        }
        if let Some(policy) = self.policy {
            cache = cache.with_policy(policy);
        }
        Ok(cache)
    }
}

fn build_job(spec: &JobSpec) -> Result<Job> {
    let mut builder = Job::builder().script(spec.script.iter().map(String::as_str));
    if let Some(name) = &spec.name {
        builder = builder.name(name.as_str());
    }
    if let Some(stage) = &spec.stage {
        builder = builder.stage(stage.as_str());
    }
    if let Some(trigger) = &spec.trigger {
        builder = builder.trigger(build_trigger(trigger)?);
    }
    let mut job = builder.build()?;

    if let Some(image) = &spec.image {
        job.set_image(image.to_image());
    }
    job.add_variables(spec.variables.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .add_tags(spec.tags.iter().map(String::as_str))
        .append_rules(spec.rules.iter().cloned());
    if let Some(artifacts) = &spec.artifacts {
        job.add_artifact_paths(artifacts.paths.iter().map(String::as_str));
        if let Some(name) = &artifacts.name {
            job.set_artifacts_name(name.as_str());
        }
        if let Some(expire_in) = &artifacts.expire_in {
            job.set_artifacts_expire_in(expire_in.as_str());
        }
        if let Some(when) = artifacts.when {
            job.set_artifacts_when(when);
        }
    }
    if let Some(cache) = &spec.cache {
        job.set_cache(Some(cache.to_cache()?));
    }
    if let Some(when) = spec.when {
        job.set_when(when);
    }
    if let Some(allow_failure) = spec.allow_failure {
        job.set_allow_failure(allow_failure);
    }
    if let Some(timeout) = &spec.timeout {
        job.set_timeout(timeout.as_str());
    }
    if let Some(retry) = spec.retry {
        job.set_retry(retry)?;
    }
    if let Some(group) = &spec.resource_group {
        job.set_resource_group(group.as_str());
    }
    Ok(job)
}

fn build_trigger(spec: &TriggerSpec) -> Result<Trigger> {
    let trigger = match (&spec.project, spec.include.is_empty()) {
        (Some(project), true) => Trigger::project(project.as_str(), spec.branch.clone()),
        (None, false) => Trigger::includes(spec.include.clone())?,
        (Some(_), false) => bail!("A trigger names either a project or includes, not both"),
        (None, true) => bail!("A trigger needs a project or at least one include"),
    };
    Ok(match spec.strategy {
        Some(strategy) => trigger.with_strategy(strategy),
        None => trigger,
    })
}

fn build_sequence(spec: &SequenceSpec, ids: &Ids) -> Result<Sequence> {
    let mut sequence = Sequence::new();
    for child in &spec.children {
        let suffix = Suffix {
            name: child.name.clone(),
            stage: child.stage.clone(),
        };
        sequence.add_child(ids.child(child)?, suffix);
    }
    if !spec.prepend_scripts.is_empty() {
        sequence.prepend_scripts(spec.prepend_scripts.iter().map(String::as_str));
    }
    if !spec.append_scripts.is_empty() {
        sequence.append_scripts(spec.append_scripts.iter().map(String::as_str));
    }
    if !spec.prepend_rules.is_empty() {
        sequence.prepend_rules(spec.prepend_rules.iter().cloned());
    }

    let initialize = &spec.initialize;
    if let Some(image) = &initialize.image {
        sequence.initialize_image(image.to_image());
    }
    if let Some(variables) = &initialize.variables {
        sequence.initialize_variables(variables.clone());
    }
    if let Some(tags) = &initialize.tags {
        sequence.initialize_tags(tags.iter().map(String::as_str));
    }
    if let Some(paths) = &initialize.artifacts {
        sequence.initialize_artifact_paths(paths.iter().map(String::as_str));
    }
    if let Some(cache) = &initialize.cache {
        sequence.initialize_cache(cache.to_cache()?);
    }
    if let Some(rules) = &initialize.rules {
        sequence.initialize_rules(rules.iter().cloned());
    }
    if let Some(needs) = &initialize.needs {
        sequence.initialize_needs(ids.need_refs(needs)?);
    }
    if let Some(when) = initialize.when {
        sequence.initialize_when(when);
    }
    if let Some(allow_failure) = initialize.allow_failure {
        sequence.initialize_allow_failure(allow_failure);
    }
    if let Some(timeout) = &initialize.timeout {
        sequence.initialize_timeout(timeout.as_str());
    }
    if let Some(retry) = initialize.retry {
        sequence.initialize_retry(retry)?;
    }
    if let Some(group) = &initialize.resource_group {
        sequence.initialize_resource_group(group.as_str());
    }

    let add = &spec.add;
    if add.has_scalars() {
        bail!("'add' only accepts image, variables, tags, artifacts, cache, rules and needs");
    }
    if let Some(image) = &add.image {
        sequence.set_image(image.to_image());
    }
    if let Some(variables) = &add.variables {
        sequence.add_variables(variables.clone());
    }
    if let Some(tags) = &add.tags {
        sequence.add_tags(tags.iter().map(String::as_str));
    }
    if let Some(paths) = &add.artifacts {
        sequence.add_artifact_paths(paths.iter().map(String::as_str));
    }
    if let Some(cache) = &add.cache {
        sequence.set_cache(cache.to_cache()?);
    }
    if let Some(rules) = &add.rules {
        sequence.append_rules(rules.iter().cloned());
    }
    if let Some(needs) = &add.needs {
        sequence.add_needs(ids.need_refs(needs)?);
    }

    let replace = &spec.replace;
    if let Some(image) = &replace.image {
        sequence.override_image(image.to_image());
    }
    if let Some(variables) = &replace.variables {
        sequence.override_variables(variables.clone());
    }
    if let Some(tags) = &replace.tags {
        sequence.override_tags(tags.iter().map(String::as_str));
    }
    if let Some(paths) = &replace.artifacts {
        sequence.override_artifact_paths(paths.iter().map(String::as_str));
    }
    if let Some(cache) = &replace.cache {
        sequence.override_cache(cache.to_cache()?);
    }
    if let Some(rules) = &replace.rules {
        sequence.override_rules(rules.iter().cloned());
    }
    if let Some(needs) = &replace.needs {
        sequence.override_needs(ids.need_refs(needs)?);
    }
    if let Some(when) = replace.when {
        sequence.override_when(when);
    }
    if let Some(allow_failure) = replace.allow_failure {
        sequence.override_allow_failure(allow_failure);
    }
    if let Some(timeout) = &replace.timeout {
        sequence.override_timeout(timeout.as_str());
    }
    if let Some(retry) = replace.retry {
        sequence.override_retry(retry)?;
    }
    if let Some(group) = &replace.resource_group {
        sequence.override_resource_group(group.as_str());
    }

    Ok(sequence)
}
