use indexmap::{IndexMap, IndexSet};

use crate::cache::Cache;
use crate::error::{PipelineError, Result};
use crate::image::Image;
use crate::inherit::{Edits, RuleAddition};
use crate::job::Job;
use crate::need::NeedRef;
use crate::pipeline::{JobId, SequenceId};
use crate::rule::{Rule, When};

/// Arena handle of a sequence child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Job(JobId),
    Sequence(SequenceId),
}

impl From<JobId> for Node {
    fn from(id: JobId) -> Self {
        Self::Job(id)
    }
}

impl From<SequenceId> for Node {
    fn from(id: SequenceId) -> Self {
        Self::Sequence(id)
    }
}

/// Name and stage suffixes a child is added under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suffix {
    pub name: Option<String>,
    pub stage: Option<String>,
}

impl Suffix {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            stage: None,
        }
    }

    pub fn stage(stage: impl Into<String>) -> Self {
        Self {
            name: None,
            stage: Some(stage.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub(crate) fn apply(&self, job: &mut Job) {
        job.extend_name(self.name.as_deref());
        job.extend_stage(self.stage.as_deref());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub node: Node,
    pub suffix: Suffix,
}

#[derive(Debug, Clone)]
enum ScriptEdit {
    Prepend(Vec<String>),
    Append(Vec<String>),
}

#[derive(Debug, Clone, Default)]
struct AttributeEdits {
    image: Edits<Option<Image>>,
    variables: Edits<IndexMap<String, String>>,
    tags: Edits<IndexSet<String>>,
    artifact_paths: Edits<IndexSet<String>>,
    cache: Edits<Option<Cache>>,
    rules: Edits<Vec<Rule>>,
    when: Edits<Option<When>>,
    allow_failure: Edits<Option<bool>>,
    timeout: Edits<Option<String>>,
    retry: Edits<Option<u8>>,
    resource_group: Edits<Option<String>>,
}

/// Group of jobs and nested sequences sharing inherited configuration.
///
/// Nothing recorded on a sequence touches the jobs it contains. The edits are
/// replayed on resolved copies whenever the pipeline is rendered.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    children: Vec<Child>,
    edits: AttributeEdits,
    needs: Edits<Option<Vec<NeedRef>>>,
    scripts: Vec<ScriptEdit>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn add_children<I, N>(&mut self, nodes: I, suffix: Suffix) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(|node| Child {
            node: node.into(),
            suffix: suffix.clone(),
        }));
        self
    }

    pub fn add_child(&mut self, node: impl Into<Node>, suffix: Suffix) -> &mut Self {
        self.add_children([node.into()], suffix)
    }

    pub fn prepend_scripts<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .push(ScriptEdit::Prepend(lines.into_iter().map(Into::into).collect()));
        self
    }

    pub fn append_scripts<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .push(ScriptEdit::Append(lines.into_iter().map(Into::into).collect()));
        self
    }

    pub fn initialize_image(&mut self, image: impl Into<Image>) -> &mut Self {
        self.edits.image.initialize(Some(image.into()));
        self
    }

    pub fn set_image(&mut self, image: impl Into<Image>) -> &mut Self {
        self.edits.image.add(image.into());
        self
    }

    pub fn override_image(&mut self, image: impl Into<Image>) -> &mut Self {
        self.edits.image.replace(Some(image.into()));
        self
    }

    pub fn initialize_variables<I, K, V>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.edits.variables.initialize(collect_map(variables));
        self
    }

    pub fn add_variables<I, K, V>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.edits.variables.add(collect_map(variables));
        self
    }

    pub fn override_variables<I, K, V>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.edits.variables.replace(collect_map(variables));
        self
    }

    pub fn initialize_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edits.tags.initialize(collect_set(tags));
        self
    }

    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edits.tags.add(collect_set(tags));
        self
    }

    pub fn override_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edits.tags.replace(collect_set(tags));
        self
    }

    pub fn initialize_artifact_paths<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edits.artifact_paths.initialize(collect_set(paths));
        self
    }

    pub fn add_artifact_paths<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edits.artifact_paths.add(collect_set(paths));
        self
    }

    pub fn override_artifact_paths<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edits.artifact_paths.replace(collect_set(paths));
        self
    }

    pub fn initialize_cache(&mut self, cache: Cache) -> &mut Self {
        self.edits.cache.initialize(Some(cache));
        self
    }

    pub fn set_cache(&mut self, cache: Cache) -> &mut Self {
        self.edits.cache.add(cache);
        self
    }

    pub fn override_cache(&mut self, cache: Cache) -> &mut Self {
        self.edits.cache.replace(Some(cache));
        self
    }

    pub fn initialize_rules<I>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.edits.rules.initialize(rules.into_iter().collect());
        self
    }

    pub fn append_rules<I>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.edits.rules.add(RuleAddition {
            prepend: Vec::new(),
            append: rules.into_iter().collect(),
        });
        self
    }

    pub fn prepend_rules<I>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.edits.rules.add(RuleAddition {
            prepend: rules.into_iter().collect(),
            append: Vec::new(),
        });
        self
    }

    pub fn override_rules<I>(&mut self, rules: I) -> &mut Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.edits.rules.replace(rules.into_iter().collect());
        self
    }

    /// Needs for the jobs of the first stage this sequence resolves to.
    pub fn add_needs<I, N>(&mut self, needs: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NeedRef>,
    {
        self.needs.add(needs.into_iter().map(Into::into).collect());
        self
    }

    pub fn initialize_needs<I, N>(&mut self, needs: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NeedRef>,
    {
        self.needs
            .initialize(Some(needs.into_iter().map(Into::into).collect()));
        self
    }

    pub fn override_needs<I, N>(&mut self, needs: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NeedRef>,
    {
        self.needs
            .replace(Some(needs.into_iter().map(Into::into).collect()));
        self
    }

    pub fn initialize_when(&mut self, when: When) -> &mut Self {
        self.edits.when.initialize(Some(when));
        self
    }

    pub fn override_when(&mut self, when: When) -> &mut Self {
        self.edits.when.replace(Some(when));
        self
    }

    pub fn initialize_allow_failure(&mut self, allow_failure: bool) -> &mut Self {
        self.edits.allow_failure.initialize(Some(allow_failure));
        self
    }

    pub fn override_allow_failure(&mut self, allow_failure: bool) -> &mut Self {
        self.edits.allow_failure.replace(Some(allow_failure));
        self
    }

    pub fn initialize_timeout(&mut self, timeout: impl Into<String>) -> &mut Self {
        self.edits.timeout.initialize(Some(timeout.into()));
        self
    }

    pub fn override_timeout(&mut self, timeout: impl Into<String>) -> &mut Self {
        self.edits.timeout.replace(Some(timeout.into()));
        self
    }

    pub fn initialize_retry(&mut self, retry: u8) -> Result<&mut Self> {
        self.edits.retry.initialize(Some(checked_retry(retry)?));
        Ok(self)
    }

    pub fn override_retry(&mut self, retry: u8) -> Result<&mut Self> {
        self.edits.retry.replace(Some(checked_retry(retry)?));
        Ok(self)
    }

    pub fn initialize_resource_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.edits.resource_group.initialize(Some(group.into()));
        self
    }

    pub fn override_resource_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.edits.resource_group.replace(Some(group.into()));
        self
    }

    pub(crate) fn has_needs(&self) -> bool {
        !self.needs.is_empty()
    }

    pub(crate) fn apply_needs(&self, job: &mut Job) {
        self.needs.apply(&mut job.needs);
    }

    /// Replays every recorded attribute edit on a resolved job copy.
    pub(crate) fn apply_edits(&self, job: &mut Job) {
        for edit in &self.scripts {
            match edit {
                ScriptEdit::Prepend(lines) => job.prepend_scripts(lines.iter().cloned()),
                ScriptEdit::Append(lines) => job.append_scripts(lines.iter().cloned()),
            };
        }
        let edits = &self.edits;
        edits.image.apply(&mut job.image);
        edits.variables.apply(&mut job.variables);
        edits.tags.apply(&mut job.tags);
        edits.artifact_paths.apply(&mut job.artifacts.paths);
        edits.cache.apply(&mut job.cache);
        edits.rules.apply(&mut job.rules);
        edits.when.apply(&mut job.when);
        edits.allow_failure.apply(&mut job.allow_failure);
        edits.timeout.apply(&mut job.timeout);
        edits.retry.apply(&mut job.retry);
        edits.resource_group.apply(&mut job.resource_group);
    }
}

fn checked_retry(retry: u8) -> Result<u8> {
    if retry > 2 {
        return Err(PipelineError::InvalidRetry { count: retry });
    }
    Ok(retry)
}

fn collect_map<I, K, V>(variables: I) -> IndexMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    variables
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn collect_set<I, S>(values: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}
