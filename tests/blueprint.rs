use ci_compose::blueprint::Blueprint;
use ci_compose::validation::validate_blueprint;
use ci_compose::{CiEnvironment, Image, Job, Need, NeedRef, Pipeline, Rule, Sequence, Suffix, When};
use pretty_assertions::assert_eq;

const BLUEPRINT: &str = r#"
services:
- docker:dind
jobs:
  build:
    stage: build
    script:
    - docker build .
    artifacts:
      paths: [dist]
  deploy:
    stage: deploy
    script:
    - ./deploy.sh
    needs:
    - job: build
    - name: lint
      artifacts: false
sequences:
  release:
    children:
    - job: build
    - job: deploy
    prepend_rules:
    - if: $CI_COMMIT_TAG
    initialize:
      image: docker:27
      when: on_success
    add:
      tags: [docker]
      variables:
        DOCKER_TLS_CERTDIR: /certs
pipeline:
  children:
  - sequence: release
    stage: prod
"#;

fn equivalent_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline.add_services(["docker:dind"]);

    let mut build = Job::new("build", ["docker build ."]).unwrap();
    build.add_artifact_paths(["dist"]);
    let build = pipeline.add_job(build);
    let mut deploy = Job::new("deploy", ["./deploy.sh"]).unwrap();
    deploy.set_needs([
        NeedRef::from(build),
        NeedRef::from(Need::new("lint").with_artifacts(false)),
    ]);
    let deploy = pipeline.add_job(deploy);

    let release = pipeline.add_sequence(Sequence::new());
    pipeline[release]
        .add_children([build, deploy], Suffix::none())
        .prepend_rules([Rule::new("$CI_COMMIT_TAG")])
        .initialize_image(Image::new("docker:27"))
        .initialize_when(When::OnSuccess)
        .add_tags(["docker"])
        .add_variables([("DOCKER_TLS_CERTDIR", "/certs")]);
    pipeline.add_children([release], Suffix::stage("prod"));
    pipeline
}

#[test]
fn blueprint_matches_builder_pipeline() {
    let env = CiEnvironment::default();
    let loaded = Blueprint::from_yaml(BLUEPRINT)
        .unwrap()
        .build_pipeline()
        .unwrap()
        .render_with(&env)
        .unwrap();
    let built = equivalent_pipeline().render_with(&env).unwrap();
    assert_eq!(loaded, built);

    assert_eq!(loaded.stages, ["build_prod", "deploy_prod"]);
    let needs: Vec<_> = loaded.jobs["deploy-prod"]
        .needs
        .iter()
        .flatten()
        .map(|need| need.job().to_string())
        .collect();
    assert_eq!(needs, ["build-prod", "lint"]);
}

#[test]
fn blueprint_validates_cleanly() {
    let blueprint = Blueprint::from_yaml(BLUEPRINT).unwrap();
    let report = validate_blueprint(&blueprint);
    assert!(report.is_ok(), "{:?}", report.errors);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = Blueprint::from_yaml("jobs:\n  build:\n    stage: build\n    scripts: [make]\n")
        .unwrap_err();
    assert!(format!("{err:#}").contains("scripts"));
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Blueprint::load(&dir.path().join("missing.yml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read blueprint file"));
}

#[test]
fn trigger_jobs_load_from_yaml() {
    let blueprint = Blueprint::from_yaml(
        r#"
jobs:
  downstream:
    stage: downstream
    trigger:
      project: group/deployer
      branch: main
      strategy: depend
pipeline:
  children:
  - job: downstream
"#,
    )
    .unwrap();
    let yaml = blueprint
        .build_pipeline()
        .unwrap()
        .to_yaml_with(&CiEnvironment::default())
        .unwrap();
    assert!(yaml.contains(
        "  trigger:\n    project: group/deployer\n    branch: main\n    strategy: depend\n"
    ));
}
