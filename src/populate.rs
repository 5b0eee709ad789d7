//! Flattening of the sequence tree into resolved jobs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};

use crate::error::{PipelineError, Result};
use crate::job::Job;
use crate::need::{Need, NeedRef};
use crate::pipeline::{JobId, Pipeline, SequenceId};
use crate::sequence::Node;

impl Pipeline {
    /// Resolved, independent copies of every job below `id`.
    ///
    /// Each child is copied and renamed by the suffix it was added under, then
    /// the sequence's needs go to the jobs sharing the first job's stage, and
    /// finally its attribute edits are applied to all of them. Nested
    /// sequences are resolved first, so outer sequences see the result of
    /// inner ones.
    pub fn populated_jobs(&self, id: SequenceId) -> Result<Vec<Job>> {
        let mut visiting = Vec::new();
        self.populate(id, &mut visiting)
    }

    fn populate(&self, id: SequenceId, visiting: &mut Vec<SequenceId>) -> Result<Vec<Job>> {
        if visiting.contains(&id) {
            return Err(PipelineError::Cycle { sequence: id.0 });
        }
        visiting.push(id);

        let sequence = &self[id];
        let mut jobs = Vec::new();
        for child in sequence.children() {
            match child.node {
                Node::Sequence(inner) => {
                    for mut job in self.populate(inner, visiting)? {
                        child.suffix.apply(&mut job);
                        jobs.push(job);
                    }
                }
                Node::Job(job_id) => {
                    let mut job = self[job_id].resolved_copy(job_id);
                    child.suffix.apply(&mut job);
                    jobs.push(job);
                }
            }
        }

        if sequence.has_needs()
            && let Some(first_stage) = jobs.first().map(|job| job.stage().to_string())
        {
            for job in jobs.iter_mut().filter(|job| job.stage() == first_stage) {
                sequence.apply_needs(job);
            }
        }
        for job in &mut jobs {
            sequence.apply_edits(job);
        }

        trace!(sequence = id.0, jobs = jobs.len(), "Sequence populated");
        visiting.pop();
        Ok(jobs)
    }

    /// Resolved jobs of the last stage `id` runs, in first-seen stage order.
    pub fn last_jobs_executed(&self, id: SequenceId) -> Result<Vec<Job>> {
        let jobs = self.populated_jobs(id)?;
        let Some(last_stage) = last_stage(&jobs) else {
            return Ok(Vec::new());
        };
        Ok(jobs
            .into_iter()
            .filter(|job| job.stage() == last_stage)
            .collect())
    }

    /// Every composed name the job takes in the rendered pipeline.
    ///
    /// A job added under several parents has one name per path from the root.
    /// Jobs not reachable from the root have none.
    pub fn instance_names(&self, id: JobId) -> Result<BTreeSet<String>> {
        let resolved = self.populated_jobs(self.root())?;
        Ok(resolved
            .iter()
            .filter(|job| job.origin() == Some(id))
            .map(|job| job.name().to_string())
            .collect())
    }
}

fn last_stage(jobs: &[Job]) -> Option<String> {
    let stages: IndexSet<&str> = jobs.iter().map(Job::stage).collect();
    stages.last().map(|stage| stage.to_string())
}

/// Top-level keys the orchestrator reads as global configuration.
const RESERVED_KEYS: [&str; 8] = [
    "cache",
    "default",
    "image",
    "include",
    "services",
    "stages",
    "variables",
    "workflow",
];

/// Fails when two resolved jobs end up with the same name, or when a name would
/// shadow a top-level key of the document. Names differing only in case or
/// `_`/`-` count as the same.
pub(crate) fn check_unique_names(jobs: &[Job]) -> Result<()> {
    let mut seen: IndexMap<String, Vec<String>> = IndexMap::new();
    for job in jobs {
        if RESERVED_KEYS.contains(&job.name()) {
            return Err(PipelineError::ReservedJobName {
                job: job.name().to_string(),
            });
        }
        let key = job.name().to_lowercase().replace('_', "-");
        seen.entry(key).or_default().push(job.name().to_string());
    }
    match seen.into_iter().find(|(_, names)| names.len() > 1) {
        Some((name, jobs)) => Err(PipelineError::DuplicateJobName { name, jobs }),
        None => Ok(()),
    }
}

/// Expands job and sequence references of resolved jobs into rendered needs.
pub(crate) struct NeedResolver<'a> {
    pipeline: &'a Pipeline,
    names_by_origin: HashMap<JobId, BTreeSet<String>>,
    last_jobs: HashMap<SequenceId, Vec<JobId>>,
}

impl<'a> NeedResolver<'a> {
    pub(crate) fn new(pipeline: &'a Pipeline, resolved: &[Job]) -> Self {
        let mut names_by_origin: HashMap<JobId, BTreeSet<String>> = HashMap::new();
        for job in resolved {
            if let Some(origin) = job.origin() {
                names_by_origin
                    .entry(origin)
                    .or_default()
                    .insert(job.name().to_string());
            }
        }
        Self {
            pipeline,
            names_by_origin,
            last_jobs: HashMap::new(),
        }
    }

    /// One need per target name, sorted by name. Plain needs on the same name
    /// as an expanded reference win because they carry project and artifact
    /// settings.
    pub(crate) fn needs(&mut self, refs: &[NeedRef]) -> Result<Vec<Need>> {
        let mut needs: BTreeMap<String, Need> = BTreeMap::new();
        for need_ref in refs {
            match need_ref {
                NeedRef::Need(need) => {
                    needs.insert(need.job().to_string(), need.clone());
                }
                other => {
                    for name in self.target_names(other)? {
                        needs.entry(name.clone()).or_insert_with(|| Need::new(name));
                    }
                }
            }
        }
        Ok(needs.into_values().collect())
    }

    pub(crate) fn dependency_names(&mut self, refs: &[NeedRef]) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for need_ref in refs {
            match need_ref {
                NeedRef::Need(need) => {
                    names.insert(need.job().to_string());
                }
                other => names.extend(self.target_names(other)?),
            }
        }
        Ok(names.into_iter().collect())
    }

    fn target_names(&mut self, need_ref: &NeedRef) -> Result<BTreeSet<String>> {
        let origins = match need_ref {
            NeedRef::Need(need) => return Ok(BTreeSet::from([need.job().to_string()])),
            NeedRef::Job(id) => vec![*id],
            NeedRef::Sequence(id) => self.last_jobs(*id)?,
        };
        let names: BTreeSet<String> = origins
            .iter()
            .filter_map(|origin| self.names_by_origin.get(origin))
            .flatten()
            .cloned()
            .collect();
        if names.is_empty() {
            warn!(
                reference = ?need_ref,
                "Need target is not part of the pipeline and contributes no needs"
            );
        } else {
            debug!(reference = ?need_ref, names = names.len(), "Need target expanded");
        }
        Ok(names)
    }

    fn last_jobs(&mut self, id: SequenceId) -> Result<Vec<JobId>> {
        if let Some(origins) = self.last_jobs.get(&id) {
            return Ok(origins.clone());
        }
        let origins: Vec<JobId> = self
            .pipeline
            .last_jobs_executed(id)?
            .iter()
            .filter_map(Job::origin)
            .collect();
        self.last_jobs.insert(id, origins.clone());
        Ok(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{Sequence, Suffix};

    #[test]
    fn cycles_are_reported() {
        let mut pipeline = Pipeline::new();
        let outer = pipeline.add_sequence(Sequence::new());
        let inner = pipeline.add_sequence(Sequence::new());
        pipeline[outer].add_child(inner, Suffix::none());
        pipeline[inner].add_child(outer, Suffix::none());
        pipeline.add_children([outer], Suffix::none());
        assert!(matches!(
            pipeline.populated_jobs(pipeline.root()),
            Err(PipelineError::Cycle { .. })
        ));
    }

    #[test]
    fn last_stage_follows_first_seen_order() {
        let mut pipeline = Pipeline::new();
        let zeta = pipeline.add_job(Job::new("zeta", ["z"]).unwrap());
        let alpha = pipeline.add_job(Job::new("alpha", ["a"]).unwrap());
        let sequence = pipeline.add_sequence(Sequence::new());
        pipeline[sequence].add_children([zeta, alpha], Suffix::none());

        let last = pipeline.last_jobs_executed(sequence).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].stage(), "alpha");
        assert_eq!(last[0].origin(), Some(alpha));
    }

    #[test]
    fn names_differing_in_case_collide() {
        let jobs = vec![
            Job::new("Build", ["a"]).unwrap(),
            Job::new("build", ["b"]).unwrap(),
        ];
        let err = check_unique_names(&jobs).unwrap_err();
        match err {
            PipelineError::DuplicateJobName { name, jobs } => {
                assert_eq!(name, "build");
                assert_eq!(jobs, ["Build", "build"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reserved_keys_are_not_job_names() {
        for name in ["stages", "include", "services", "variables", "workflow"] {
            let jobs = vec![Job::new(name, ["true"]).unwrap()];
            assert!(matches!(
                check_unique_names(&jobs),
                Err(PipelineError::ReservedJobName { job }) if job == name
            ));
        }
        let jobs = vec![Job::new("stages_check", ["true"]).unwrap()];
        assert!(check_unique_names(&jobs).is_ok());
    }
}
