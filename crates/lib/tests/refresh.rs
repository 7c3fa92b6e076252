//! Source pinning and description rewriting.

mod common;

use std::fs;

use strata_lib::{Pipeline, Project};

use common::{project, write_file};

#[test]
fn refresh_rewrites_only_touched_files() {
  let (temp, project, context) = project(&[
    ("plain-a.yaml", "kind: stack\n"),
    ("plain-b.yaml", "kind: stack\nbuild-depends: [plain-a.yaml]\n"),
    (
      "app.yaml",
      "kind: import\nbuild-depends: [plain-b.yaml]\nsources:\n  - kind: local\n    path: files/data\n",
    ),
  ]);
  write_file(temp.path(), "files/data/payload.txt", "content");

  let untouched_a = fs::read(temp.path().join("plain-a.yaml")).unwrap();
  let untouched_b = fs::read(temp.path().join("plain-b.yaml")).unwrap();

  let pipeline = Pipeline::new(&context, project, "app.yaml").unwrap();
  assert_eq!(pipeline.inconsistent().len(), 1);

  let changed = pipeline.refresh().unwrap();
  assert_eq!(changed.len(), 1);
  assert_eq!(changed[0].provenance().filename, "app.yaml");

  // Only the file declaring the pinned source was rewritten.
  assert_eq!(fs::read(temp.path().join("plain-a.yaml")).unwrap(), untouched_a);
  assert_eq!(fs::read(temp.path().join("plain-b.yaml")).unwrap(), untouched_b);
  let rewritten = fs::read_to_string(temp.path().join("app.yaml")).unwrap();
  assert!(rewritten.contains("ref:"));
}

#[test]
fn refreshed_project_is_consistent_on_reload() {
  let (temp, project, context) = project(&[(
    "app.yaml",
    "kind: import\nsources:\n  - kind: local\n    path: files/data\n",
  )]);
  write_file(temp.path(), "files/data/payload.txt", "content");

  let pipeline = Pipeline::new(&context, project, "app.yaml").unwrap();
  assert!(pipeline.target().cache_key().is_none());
  pipeline.refresh().unwrap();

  // A fresh pipeline over the rewritten description sees pinned sources
  // and a defined cache key.
  let reloaded = Project::load(temp.path()).unwrap();
  let pipeline = Pipeline::new(&context, reloaded, "app.yaml").unwrap();
  assert!(pipeline.inconsistent().is_empty());
  let key = pipeline.target().cache_key().unwrap();
  assert_eq!(key.as_str().len(), 64);
}

#[test]
fn second_refresh_over_unchanged_content_changes_nothing() {
  let (temp, project, context) = project(&[(
    "app.yaml",
    "kind: import\nsources:\n  - kind: local\n    path: files/data\n",
  )]);
  write_file(temp.path(), "files/data/payload.txt", "content");

  let pipeline = Pipeline::new(&context, project, "app.yaml").unwrap();
  assert_eq!(pipeline.refresh().unwrap().len(), 1);

  let after_first = fs::read(temp.path().join("app.yaml")).unwrap();

  let reloaded = Project::load(temp.path()).unwrap();
  let pipeline = Pipeline::new(&context, reloaded, "app.yaml").unwrap();
  assert!(pipeline.refresh().unwrap().is_empty());
  assert_eq!(fs::read(temp.path().join("app.yaml")).unwrap(), after_first);
}

#[test]
fn refresh_repins_when_source_content_changes() {
  let (temp, project, context) = project(&[(
    "app.yaml",
    "kind: import\nsources:\n  - kind: local\n    path: files/data\n",
  )]);
  write_file(temp.path(), "files/data/payload.txt", "first");

  let pipeline = Pipeline::new(&context, project, "app.yaml").unwrap();
  pipeline.refresh().unwrap();
  let reloaded = Project::load(temp.path()).unwrap();
  let key_before = Pipeline::new(&context, reloaded, "app.yaml")
    .unwrap()
    .target()
    .cache_key()
    .unwrap();

  write_file(temp.path(), "files/data/payload.txt", "second");

  let reloaded = Project::load(temp.path()).unwrap();
  let pipeline = Pipeline::new(&context, reloaded, "app.yaml").unwrap();
  let changed = pipeline.refresh().unwrap();
  assert_eq!(changed.len(), 1);

  let reloaded = Project::load(temp.path()).unwrap();
  let key_after = Pipeline::new(&context, reloaded, "app.yaml")
    .unwrap()
    .target()
    .cache_key()
    .unwrap();
  assert_ne!(key_before, key_after);
}

#[test]
fn failed_refresh_commits_nothing() {
  let (temp, project, context) = project(&[
    (
      "good.yaml",
      "kind: import\nsources:\n  - kind: local\n    path: files/good\n",
    ),
    (
      "app.yaml",
      "kind: import\nbuild-depends: [good.yaml]\nsources:\n  - kind: local\n    path: files/bad\n",
    ),
  ]);
  write_file(temp.path(), "files/good/data.txt", "ok");
  write_file(temp.path(), "files/bad/data.txt", "doomed");

  let good_before = fs::read(temp.path().join("good.yaml")).unwrap();
  let app_before = fs::read(temp.path().join("app.yaml")).unwrap();

  let pipeline = Pipeline::new(&context, project, "app.yaml").unwrap();

  // The second component's source disappears between construction and
  // refresh; pinning it fails.
  fs::remove_dir_all(temp.path().join("files/bad")).unwrap();
  let result = pipeline.refresh();
  assert!(result.is_err());

  // No file was rewritten, not even for the component that pinned fine.
  assert_eq!(fs::read(temp.path().join("good.yaml")).unwrap(), good_before);
  assert_eq!(fs::read(temp.path().join("app.yaml")).unwrap(), app_before);
}

#[test]
fn refresh_order_follows_traversal() {
  let (temp, project, context) = project(&[
    (
      "base.yaml",
      "kind: import\nsources:\n  - kind: local\n    path: files/base\n",
    ),
    (
      "app.yaml",
      "kind: import\nbuild-depends: [base.yaml]\nsources:\n  - kind: local\n    path: files/app\n",
    ),
  ]);
  write_file(temp.path(), "files/base/data.txt", "base");
  write_file(temp.path(), "files/app/data.txt", "app");

  let pipeline = Pipeline::new(&context, project, "app.yaml").unwrap();
  let changed = pipeline.refresh().unwrap();

  let order: Vec<_> = changed.iter().map(|s| s.provenance().filename.clone()).collect();
  assert_eq!(order, ["base.yaml", "app.yaml"]);
}
