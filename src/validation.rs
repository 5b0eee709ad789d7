use std::collections::HashSet;

use serde::Serialize;

use crate::blueprint::{Blueprint, ChildSpec, NeedSpec, SequenceSpec};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Checks references and reachability without building the pipeline.
pub fn validate_blueprint(blueprint: &Blueprint) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (key, job) in &blueprint.jobs {
        let owner = format!("Job '{key}'");
        if job.name.as_deref().is_none_or(str::is_empty)
            && job.stage.as_deref().is_none_or(str::is_empty)
        {
            report
                .errors
                .push(format!("{owner} needs a name or a stage"));
        }
        match (&job.trigger, job.script.iter().any(|line| !line.trim().is_empty())) {
            (Some(_), true) => report
                .errors
                .push(format!("{owner} cannot declare both a script and a trigger")),
            (None, false) => report
                .errors
                .push(format!("{owner} has an empty script")),
            _ => {}
        }
        if let Some(needs) = &job.needs {
            report.merge(validate_needs(&owner, needs, blueprint));
        }
        if let Some(dependencies) = &job.dependencies {
            report.merge(validate_needs(&owner, dependencies, blueprint));
        }
    }

    for (key, sequence) in &blueprint.sequences {
        report.merge(validate_sequence(&format!("Sequence '{key}'"), sequence, blueprint));
    }
    report.merge(validate_sequence("Pipeline", &blueprint.pipeline, blueprint));

    if blueprint.pipeline.children.is_empty() {
        report
            .warnings
            .push("Pipeline has no children and renders no jobs".into());
    }

    let reachable = Reachable::from_root(blueprint);
    for key in blueprint.jobs.keys() {
        if !reachable.jobs.contains(key.as_str()) {
            report.warnings.push(format!(
                "Job '{key}' is not reachable from the pipeline and is not rendered"
            ));
        }
    }
    for key in blueprint.sequences.keys() {
        if !reachable.sequences.contains(key.as_str()) {
            report.warnings.push(format!(
                "Sequence '{key}' is not reachable from the pipeline and is not rendered"
            ));
        }
    }

    report
}

fn validate_sequence(owner: &str, sequence: &SequenceSpec, blueprint: &Blueprint) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (idx, child) in sequence.children.iter().enumerate() {
        report.merge(validate_child(owner, idx, child, blueprint));
    }
    for attributes in [&sequence.initialize, &sequence.add, &sequence.replace] {
        if let Some(needs) = &attributes.needs {
            report.merge(validate_needs(owner, needs, blueprint));
        }
    }
    if sequence.add.has_scalars() {
        report.errors.push(format!(
            "{owner} uses 'add' for a single-valued attribute; use 'initialize' or 'override'"
        ));
    }
    report
}

fn validate_child(owner: &str, idx: usize, child: &ChildSpec, blueprint: &Blueprint) -> ValidationReport {
    let mut report = ValidationReport::default();
    match (&child.job, &child.sequence) {
        (Some(job), None) if !blueprint.jobs.contains_key(job) => report.errors.push(format!(
            "{owner} child {} references unknown job '{job}'",
            idx + 1
        )),
        (None, Some(sequence)) if !blueprint.sequences.contains_key(sequence) => {
            report.errors.push(format!(
                "{owner} child {} references unknown sequence '{sequence}'",
                idx + 1
            ))
        }
        (Some(_), Some(_)) | (None, None) => report.errors.push(format!(
            "{owner} child {} must name exactly one of 'job' or 'sequence'",
            idx + 1
        )),
        _ => {}
    }
    report
}

fn validate_needs(owner: &str, needs: &[NeedSpec], blueprint: &Blueprint) -> ValidationReport {
    let mut report = ValidationReport::default();
    let reachable = Reachable::from_root(blueprint);
    for need in needs {
        match need {
            NeedSpec::Job(reference) => {
                if !blueprint.jobs.contains_key(&reference.job) {
                    report.errors.push(format!(
                        "{owner} needs unknown job '{}'",
                        reference.job
                    ));
                } else if !reachable.jobs.contains(reference.job.as_str()) {
                    report.warnings.push(format!(
                        "{owner} needs job '{}' which is not part of the pipeline; the need is dropped",
                        reference.job
                    ));
                }
            }
            NeedSpec::Sequence(reference) => {
                if !blueprint.sequences.contains_key(&reference.sequence) {
                    report.errors.push(format!(
                        "{owner} needs unknown sequence '{}'",
                        reference.sequence
                    ));
                } else if !reachable.sequences.contains(reference.sequence.as_str()) {
                    report.warnings.push(format!(
                        "{owner} needs sequence '{}' which is not part of the pipeline; the need is dropped",
                        reference.sequence
                    ));
                }
            }
            NeedSpec::Named(need) => {
                if need.git_ref.is_some() && need.project.is_none() {
                    report.errors.push(format!(
                        "{owner} need on '{}' sets a ref without a project",
                        need.name
                    ));
                }
            }
        }
    }
    report
}

#[derive(Debug, Default)]
struct Reachable<'a> {
    jobs: HashSet<&'a str>,
    sequences: HashSet<&'a str>,
}

impl<'a> Reachable<'a> {
    fn from_root(blueprint: &'a Blueprint) -> Self {
        let mut reachable = Self::default();
        reachable.visit(&blueprint.pipeline, blueprint);
        reachable
    }

    fn visit(&mut self, sequence: &'a SequenceSpec, blueprint: &'a Blueprint) {
        for child in &sequence.children {
            if let Some(job) = &child.job {
                self.jobs.insert(job.as_str());
            }
            if let Some(key) = &child.sequence
                && self.sequences.insert(key.as_str())
                && let Some(inner) = blueprint.sequences.get(key)
            {
                self.visit(inner, blueprint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_unknown_children_and_unreachable_needs() {
        let blueprint = Blueprint::from_yaml(
            r#"
jobs:
  build:
    stage: build
    script: [make]
  orphan:
    stage: orphan
    script: [./orphan.sh]
  deploy:
    stage: deploy
    script: [./deploy.sh]
    needs:
    - job: orphan
pipeline:
  children:
  - job: build
  - job: deploy
  - sequence: missing
"#,
        )
        .unwrap();

        let report = validate_blueprint(&blueprint);
        assert!(!report.is_ok());
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.contains("unknown sequence 'missing'"))
        );
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("needs job 'orphan'"))
        );
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("Job 'orphan' is not reachable"))
        );
    }

    #[test]
    fn trigger_and_script_are_exclusive() {
        let blueprint = Blueprint::from_yaml(
            r#"
jobs:
  child:
    stage: child
    script: [make]
    trigger:
      include:
      - local: child.yml
pipeline:
  children:
  - job: child
"#,
        )
        .unwrap();
        let report = validate_blueprint(&blueprint);
        assert_eq!(
            report.errors,
            ["Job 'child' cannot declare both a script and a trigger"]
        );
    }
}
