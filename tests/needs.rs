use ci_compose::{CiEnvironment, Job, Need, Pipeline, Sequence, Suffix};
use pretty_assertions::assert_eq;

fn need_names(pipeline: &Pipeline, job: &str) -> Option<Vec<String>> {
    let document = pipeline.render_with(&CiEnvironment::default()).unwrap();
    document.jobs[job]
        .needs
        .as_ref()
        .map(|needs| needs.iter().map(|need| need.job().to_string()).collect())
}

#[test]
fn plain_need_renders_as_given() {
    let mut pipeline = Pipeline::new();
    let mut deploy = Job::new("deploy", ["./deploy.sh"]).unwrap();
    deploy.add_needs([Need::new("build").with_artifacts(false)]);
    let deploy = pipeline.add_job(deploy);
    pipeline.add_children([deploy], Suffix::none());

    let yaml = pipeline.to_yaml_with(&CiEnvironment::default()).unwrap();
    assert!(yaml.contains("  needs:\n  - job: build\n    artifacts: false\n"));
}

#[test]
fn remote_need_carries_project_and_ref() {
    let mut pipeline = Pipeline::new();
    let mut deploy = Job::new("deploy", ["./deploy.sh"]).unwrap();
    deploy.add_needs([Need::remote("package", "group/library", None)]);
    let deploy = pipeline.add_job(deploy);
    pipeline.add_children([deploy], Suffix::none());

    let document = pipeline.render_with(&CiEnvironment::default()).unwrap();
    let needs = document.jobs["deploy"].needs.clone().unwrap();
    assert_eq!(needs[0].project(), Some("group/library"));
    assert_eq!(needs[0].git_ref(), Some("main"));
    assert!(Need::from_parts("package", None, Some("v1".into()), true).is_err());
}

#[test]
fn job_reference_expands_to_every_instance() {
    let mut pipeline = Pipeline::new();
    let deploy = pipeline.add_job(Job::new("deploy", ["./deploy.sh"]).unwrap());
    let environments = pipeline.add_sequence(Sequence::new());
    pipeline[environments].add_child(deploy, Suffix::none());

    let mut smoke = Job::new("smoke", ["./smoke.sh"]).unwrap();
    smoke.add_needs([deploy]);
    let smoke = pipeline.add_job(smoke);

    pipeline
        .add_children([environments], Suffix::stage("prod"))
        .add_children([environments], Suffix::stage("dev"))
        .add_children([smoke], Suffix::none());

    assert_eq!(
        need_names(&pipeline, "smoke").unwrap(),
        ["deploy-dev", "deploy-prod"]
    );
}

#[test]
fn sequence_reference_expands_to_last_stage() {
    let mut pipeline = Pipeline::new();
    let compile = pipeline.add_job(
        Job::builder()
            .name("compile")
            .stage("build")
            .script(["make"])
            .build()
            .unwrap(),
    );
    let unit = pipeline.add_job(
        Job::builder()
            .name("unit")
            .stage("test")
            .script(["make test"])
            .build()
            .unwrap(),
    );
    let lint = pipeline.add_job(
        Job::builder()
            .name("lint")
            .stage("test")
            .script(["make lint"])
            .build()
            .unwrap(),
    );
    let checks = pipeline.add_sequence(Sequence::new());
    pipeline[checks].add_children([compile, unit, lint], Suffix::none());

    let mut release = Job::new("release", ["./release.sh"]).unwrap();
    release.add_needs([checks]);
    let release = pipeline.add_job(release);
    pipeline.add_children([checks], Suffix::none());
    pipeline.add_children([release], Suffix::none());

    assert_eq!(
        need_names(&pipeline, "release").unwrap(),
        ["lint-test", "unit-test"]
    );
    let last: Vec<_> = pipeline
        .last_jobs_executed(checks)
        .unwrap()
        .iter()
        .map(|job| job.name().to_string())
        .collect();
    assert_eq!(last, ["unit-test", "lint-test"]);
}

#[test]
fn sequence_needs_only_reach_first_stage() {
    let mut pipeline = Pipeline::new();
    let build = pipeline.add_job(Job::new("build", ["make"]).unwrap());
    let package = pipeline.add_job(
        Job::builder()
            .name("package")
            .stage("build")
            .script(["make dist"])
            .build()
            .unwrap(),
    );
    let test = pipeline.add_job(Job::new("test", ["make test"]).unwrap());
    let sequence = pipeline.add_sequence(Sequence::new());
    pipeline[sequence]
        .add_children([build, package, test], Suffix::none())
        .add_needs([Need::new("lint")]);
    pipeline.add_children([sequence], Suffix::none());

    assert_eq!(need_names(&pipeline, "build").unwrap(), ["lint"]);
    assert_eq!(need_names(&pipeline, "package-build").unwrap(), ["lint"]);
    assert_eq!(need_names(&pipeline, "test"), None);
}

#[test]
fn empty_needs_render_as_empty_list() {
    let mut pipeline = Pipeline::new();
    let mut lint = Job::new("lint", ["make lint"]).unwrap();
    lint.set_needs(Vec::<Need>::new());
    let lint = pipeline.add_job(lint);
    pipeline.add_children([lint], Suffix::none());

    let yaml = pipeline.to_yaml_with(&CiEnvironment::default()).unwrap();
    assert!(yaml.contains("  needs: []\n"));
}

#[test]
fn unreachable_target_contributes_nothing() {
    let mut pipeline = Pipeline::new();
    let orphan = pipeline.add_job(Job::new("orphan", ["true"]).unwrap());
    let mut deploy = Job::new("deploy", ["./deploy.sh"]).unwrap();
    deploy.add_needs([orphan]);
    let deploy = pipeline.add_job(deploy);
    pipeline.add_children([deploy], Suffix::none());

    assert_eq!(need_names(&pipeline, "deploy").unwrap(), Vec::<String>::new());
    assert!(pipeline.instance_names(orphan).unwrap().is_empty());
}

#[test]
fn needs_are_sorted_and_deduplicated() {
    let mut pipeline = Pipeline::new();
    let zeta = pipeline.add_job(Job::new("zeta", ["true"]).unwrap());
    let alpha = pipeline.add_job(Job::new("alpha", ["true"]).unwrap());
    let mut deploy = Job::new("deploy", ["./deploy.sh"]).unwrap();
    deploy
        .add_needs([zeta, alpha, zeta])
        .add_needs([Need::new("alpha").with_artifacts(false)]);
    let deploy = pipeline.add_job(deploy);
    pipeline.add_children([zeta, alpha, deploy], Suffix::none());

    let document = pipeline.render_with(&CiEnvironment::default()).unwrap();
    let needs = document.jobs["deploy"].needs.clone().unwrap();
    assert_eq!(
        needs.iter().map(Need::job).collect::<Vec<_>>(),
        ["alpha", "zeta"]
    );
    assert!(!needs[0].artifacts());
    assert!(needs[1].artifacts());
}

#[test]
fn dependencies_expand_like_needs() {
    let mut pipeline = Pipeline::new();
    let build = pipeline.add_job(Job::new("build", ["make"]).unwrap());
    let mut test = Job::new("test", ["make test"]).unwrap();
    test.add_dependencies([build]);
    let test = pipeline.add_job(test);
    pipeline
        .add_children([build], Suffix::name("linux"))
        .add_children([build], Suffix::name("macos"))
        .add_children([test], Suffix::none());

    let document = pipeline.render_with(&CiEnvironment::default()).unwrap();
    assert_eq!(
        document.jobs["test"].dependencies.clone().unwrap(),
        ["build-linux", "build-macos"]
    );
}
