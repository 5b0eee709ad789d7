use std::fs;
use std::ops::{Index, IndexMut};
use std::path::Path;

use anyhow::Context;
use indexmap::IndexSet;
use tracing::{debug, instrument};

use crate::env::CiEnvironment;
use crate::error::{PipelineError, Result};
use crate::image::Service;
use crate::include::Include;
use crate::job::Job;
use crate::populate::{NeedResolver, check_unique_names};
use crate::render::{PipelineDocument, RenderedJob};
use crate::sequence::{Node, Sequence, Suffix};

/// Handle of a job stored in a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) usize);

/// Handle of a sequence stored in a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(pub(crate) usize);

const ROOT: SequenceId = SequenceId(0);

/// Root of a pipeline and owner of every job and sequence in it.
///
/// Jobs and sequences are stored once and referenced by id, so the same job or
/// sequence can be added under several parents. Indexing with an id that was
/// not handed out by this pipeline panics.
#[derive(Debug, Clone)]
pub struct Pipeline {
    jobs: Vec<Job>,
    sequences: Vec<Sequence>,
    includes: Vec<Include>,
    services: IndexSet<Service>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            sequences: vec![Sequence::new()],
            includes: Vec::new(),
            services: IndexSet::new(),
        }
    }

    pub fn root(&self) -> SequenceId {
        ROOT
    }

    pub fn root_sequence(&mut self) -> &mut Sequence {
        &mut self[ROOT]
    }

    pub fn add_job(&mut self, job: Job) -> JobId {
        self.jobs.push(job);
        JobId(self.jobs.len() - 1)
    }

    pub fn add_sequence(&mut self, sequence: Sequence) -> SequenceId {
        self.sequences.push(sequence);
        SequenceId(self.sequences.len() - 1)
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id.0)
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&Sequence> {
        self.sequences.get(id.0)
    }

    pub fn job_ids(&self) -> impl Iterator<Item = JobId> + '_ {
        (0..self.jobs.len()).map(JobId)
    }

    /// Adds children to the root sequence.
    pub fn add_children<I, N>(&mut self, nodes: I, suffix: Suffix) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self[ROOT].add_children(nodes, suffix);
        self
    }

    pub fn add_include(&mut self, include: Include) -> Result<&mut Self> {
        include.validate()?;
        self.includes.push(include);
        Ok(self)
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn add_services<I, S>(&mut self, services: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Service>,
    {
        self.services.extend(services.into_iter().map(Into::into));
        self
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    /// Renders with the predefined variables of the current process.
    pub fn render(&self) -> Result<PipelineDocument> {
        self.render_with(&CiEnvironment::from_env())
    }

    #[instrument(skip_all, fields(jobs = self.jobs.len(), sequences = self.sequences.len()))]
    pub fn render_with(&self, env: &CiEnvironment) -> Result<PipelineDocument> {
        let resolved = self.populated_jobs(ROOT)?;
        check_unique_names(&resolved)?;

        let mut resolver = NeedResolver::new(self, &resolved);
        let mut stages = IndexSet::new();
        let mut jobs = Vec::with_capacity(resolved.len());
        for job in &resolved {
            stages.insert(job.stage().to_string());
            let needs = job.needs().map(|needs| resolver.needs(needs)).transpose()?;
            let dependencies = job
                .dependencies()
                .map(|deps| resolver.dependency_names(deps))
                .transpose()?;
            jobs.push((
                job.name().to_string(),
                RenderedJob::from_job(job, needs, dependencies, env),
            ));
        }
        debug!(stages = stages.len(), jobs = jobs.len(), "Pipeline rendered");

        Ok(PipelineDocument {
            include: self.includes.clone(),
            services: self.services.iter().cloned().collect(),
            stages: stages.into_iter().collect(),
            jobs: jobs.into_iter().collect(),
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.to_yaml_with(&CiEnvironment::from_env())
    }

    pub fn to_yaml_with(&self, env: &CiEnvironment) -> Result<String> {
        let document = self.render_with(env)?;
        serde_yaml::to_string(&document).map_err(|err| PipelineError::Serialize(err.to_string()))
    }

    pub fn to_json_with(&self, env: &CiEnvironment) -> Result<String> {
        let document = self.render_with(env)?;
        serde_json::to_string_pretty(&document)
            .map_err(|err| PipelineError::Serialize(err.to_string()))
    }

    pub fn write_yaml(&self, path: &Path) -> anyhow::Result<()> {
        let rendered = self.to_yaml()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, rendered)
            .with_context(|| format!("Failed to write pipeline: {}", path.display()))?;
        Ok(())
    }
}

impl Index<JobId> for Pipeline {
    type Output = Job;

    fn index(&self, id: JobId) -> &Job {
        &self.jobs[id.0]
    }
}

impl IndexMut<JobId> for Pipeline {
    fn index_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id.0]
    }
}

impl Index<SequenceId> for Pipeline {
    type Output = Sequence;

    fn index(&self, id: SequenceId) -> &Sequence {
        &self.sequences[id.0]
    }
}

impl IndexMut<SequenceId> for Pipeline {
    fn index_mut(&mut self, id: SequenceId) -> &mut Sequence {
        &mut self.sequences[id.0]
    }
}
