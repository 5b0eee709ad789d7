use ci_compose::blueprint::{AttributeSpec, Blueprint, ChildSpec, JobSpec, SequenceSpec};
use ci_compose::validation::validate_blueprint;

fn job_spec(stage: &str, script: &[&str]) -> JobSpec {
    JobSpec {
        stage: Some(stage.to_string()),
        script: script.iter().map(|line| line.to_string()).collect(),
        ..JobSpec::default()
    }
}

fn job_child(job: &str) -> ChildSpec {
    ChildSpec {
        job: Some(job.to_string()),
        sequence: None,
        name: None,
        stage: None,
    }
}

fn base_blueprint() -> Blueprint {
    let mut blueprint = Blueprint::default();
    blueprint
        .jobs
        .insert("build".to_string(), job_spec("build", &["make"]));
    blueprint.pipeline.children.push(job_child("build"));
    blueprint
}

#[test]
fn minimal_blueprint_passes() {
    let report = validate_blueprint(&base_blueprint());
    assert!(report.is_ok(), "{:?}", report.errors);
    assert!(report.warnings.is_empty());
}

#[test]
fn validation_catches_missing_identity_and_script() {
    let mut blueprint = base_blueprint();
    blueprint.jobs.insert("anonymous".to_string(), JobSpec::default());
    blueprint.pipeline.children.push(job_child("anonymous"));

    let report = validate_blueprint(&blueprint);
    assert!(!report.is_ok());
    assert!(
        report
            .errors
            .contains(&"Job 'anonymous' needs a name or a stage".to_string())
    );
    assert!(
        report
            .errors
            .contains(&"Job 'anonymous' has an empty script".to_string())
    );
}

#[test]
fn validation_rejects_scalar_additions() {
    let mut blueprint = base_blueprint();
    blueprint.pipeline.add = AttributeSpec {
        retry: Some(1),
        ..AttributeSpec::default()
    };

    let report = validate_blueprint(&blueprint);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Pipeline uses 'add'"));
}

#[test]
fn unreachable_sequences_are_warnings() {
    let mut blueprint = base_blueprint();
    blueprint.sequences.insert(
        "unused".to_string(),
        SequenceSpec {
            children: vec![job_child("build")],
            ..SequenceSpec::default()
        },
    );

    let report = validate_blueprint(&blueprint);
    assert!(report.is_ok());
    assert_eq!(
        report.warnings,
        ["Sequence 'unused' is not reachable from the pipeline and is not rendered"]
    );
}

#[test]
fn empty_pipeline_is_a_warning() {
    let report = validate_blueprint(&Blueprint::default());
    assert!(report.is_ok());
    assert_eq!(
        report.warnings,
        ["Pipeline has no children and renders no jobs"]
    );
}
