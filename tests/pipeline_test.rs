use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use sectional::artifact::{SectionBody, DEFAULT_SECTION};
use sectional::config::Config;
use sectional::error::Error;
use sectional::pipeline::Pipeline;
use sectional::validator::CacheValidator;
use tempfile::TempDir;

/// Creates `views/` and `cache/` inside a scratch directory.
fn setup() -> (TempDir, PathBuf, Config) {
    let dir = TempDir::new().unwrap();
    let views = dir.path().join("views");
    fs::create_dir_all(&views).unwrap();
    let config = Config::new(&views).with_cache_dir(dir.path().join("cache"));
    (dir, views, config)
}

fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
}

/// Writes a template with a fixed, known modification time.
fn write_template(views: &Path, name: &str, content: &str) -> PathBuf {
    let path = views.join(name);
    fs::write(&path, content).unwrap();
    set_mtime(&path, 1_000_000);
    fs::canonicalize(path).unwrap()
}

fn is_fresh(pipeline: &Pipeline, source: &Path) -> bool {
    CacheValidator::new(pipeline.store()).validate(source).is_some()
}

fn sorted_keys<V>(map: &indexmap::IndexMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

#[test_log::test]
fn include_merges_values_and_sections() {
    let (_dir, views, config) = setup();
    write_template(&views, "a.tpl", "@include b.tpl\n@section x\nHELLO");
    write_template(&views, "b.tpl", "@value name World\n");

    let mut pipeline = Pipeline::new(config).unwrap();
    let template = pipeline.template("a.tpl", serde_json::Value::Null).unwrap();

    assert_eq!(template.artifact().values.len(), 1);
    assert_eq!(template.value("name"), "World");
    assert_eq!(sorted_keys(&template.artifact().sections), vec!["x"]);

    let location = template.resolve_section("x").unwrap();
    let body = pipeline.store().read_section(location).unwrap();
    assert_eq!(body, SectionBody::new(2, "HELLO"));

    assert!(matches!(
        template.resolve_section("missing"),
        Err(Error::SectionNotFound { .. })
    ));
}

#[test]
fn compiled_artifact_is_fresh_until_touched() {
    let (_dir, views, config) = setup();
    let a = write_template(&views, "a.tpl", "@include b.tpl\nbody of a\n");
    let b = write_template(&views, "b.tpl", "@value lang en\n");
    let c = write_template(&views, "c.tpl", "@include a.tpl\n@section c\nC\n");

    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline.load("c.tpl").unwrap();
    assert!(is_fresh(&pipeline, &a));
    assert!(is_fresh(&pipeline, &b));
    assert!(is_fresh(&pipeline, &c));

    set_mtime(&b, 2_000_000);
    assert!(!is_fresh(&pipeline, &b));
    assert!(!is_fresh(&pipeline, &a));
    assert!(!is_fresh(&pipeline, &c));
}

#[test]
fn stale_cache_is_recompiled() {
    let (_dir, views, config) = setup();
    let page = write_template(&views, "page.tpl", "@value title Old\n");

    let first = Pipeline::new(config.clone()).unwrap().load("page.tpl").unwrap();
    assert_eq!(first.values["title"], "Old");

    fs::write(&page, "@value title New\n").unwrap();
    set_mtime(&page, 3_000_000);

    let second = Pipeline::new(config).unwrap().load("page.tpl").unwrap();
    assert_eq!(second.values["title"], "New");
    assert_ne!(first.source_mod_time, second.source_mod_time);
}

#[test]
fn fresh_cache_is_reused_from_disk() {
    let (_dir, views, config) = setup();
    let page = write_template(&views, "page.tpl", "@value title Cached\n");

    Pipeline::new(config.clone()).unwrap().load("page.tpl").unwrap();

    // Same mtime, different content: only a recompile would notice.
    fs::write(&page, "@value title Changed\n").unwrap();
    set_mtime(&page, 1_000_000);

    let artifact = Pipeline::new(config.clone()).unwrap().load("page.tpl").unwrap();
    assert_eq!(artifact.values["title"], "Cached");

    let artifact = Pipeline::new(config.with_disable_cache(true))
        .unwrap()
        .load("page.tpl")
        .unwrap();
    assert_eq!(artifact.values["title"], "Changed");
}

#[test]
fn compiling_twice_is_idempotent() {
    let (_dir, views, config) = setup();
    write_template(
        &views,
        "page.tpl",
        "intro\n@value a 1\n@section s\nS\n@include part.tpl\ntail\n",
    );
    write_template(&views, "part.tpl", "@section p\nP\n");
    let config = config.with_disable_cache(true);

    let first = Pipeline::new(config.clone()).unwrap().load("page.tpl").unwrap();
    let second = Pipeline::new(config).unwrap().load("page.tpl").unwrap();
    assert_eq!(first.sections, second.sections);
    assert_eq!(first.values, second.values);
    assert_eq!(sorted_keys(&first.sections), vec![DEFAULT_SECTION, "p", "s"]);
}

#[test]
fn corrupt_sidecar_falls_back_to_compile() {
    let (_dir, views, config) = setup();
    let page = write_template(&views, "page.tpl", "@value title Page\n");

    let mut pipeline = Pipeline::new(config.clone()).unwrap();
    pipeline.load("page.tpl").unwrap();
    let sidecar = pipeline.store().sidecar_path(&page);
    fs::write(&sidecar, "{ definitely not json").unwrap();
    assert!(!is_fresh(&pipeline, &page));

    let artifact = Pipeline::new(config).unwrap().load("page.tpl").unwrap();
    assert_eq!(artifact.values["title"], "Page");
    assert!(is_fresh(&pipeline, &page));
}

#[test]
fn include_cycles_terminate() {
    let (_dir, views, config) = setup();
    let a = write_template(&views, "a.tpl", "@include b.tpl\n@section a\nA\n");
    write_template(&views, "b.tpl", "@include a.tpl\n@section b\nB\n");
    let own = write_template(&views, "self.tpl", "@include self.tpl\n@value me 1\nbody\n");

    let mut pipeline = Pipeline::new(config.clone()).unwrap();
    let artifact = pipeline.load("a.tpl").unwrap();
    assert_eq!(sorted_keys(&artifact.sections), vec!["a", "b"]);
    assert!(artifact.cycle_cuts.is_empty());
    assert!(is_fresh(&pipeline, &a));

    let artifact = pipeline.load("self.tpl").unwrap();
    assert_eq!(artifact.values["me"], "1");
    assert_eq!(sorted_keys(&artifact.sections), vec![DEFAULT_SECTION]);
    assert!(is_fresh(&pipeline, &own));

    let reloaded = Pipeline::new(config).unwrap().load("a.tpl").unwrap();
    assert_eq!(sorted_keys(&reloaded.sections), vec!["a", "b"]);
}

#[test]
fn cycle_member_touch_invalidates_the_other() {
    let (_dir, views, config) = setup();
    let a = write_template(&views, "a.tpl", "@include b.tpl\n@section a\nA\n");
    let b = write_template(&views, "b.tpl", "@include a.tpl\n@section b\nB\n");

    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline.load("a.tpl").unwrap();
    assert!(is_fresh(&pipeline, &a));

    set_mtime(&b, 2_000_000);
    assert!(!is_fresh(&pipeline, &a));
}

#[test]
fn cycle_members_load_the_same_warm_or_cold() {
    let (dir, views, config) = setup();
    write_template(&views, "a.tpl", "@include b.tpl\n@value owner a\n@section a\nA\n");
    let b = write_template(
        &views,
        "b.tpl",
        "@include a.tpl\n@value owner b\n@value only_b 1\n@section b\nB\n",
    );

    let mut first = Pipeline::new(config.clone()).unwrap();
    first.load("a.tpl").unwrap();
    // b was compiled without a's entries, so it cannot answer for itself.
    assert!(!is_fresh(&first, &b));

    let after_a = Pipeline::new(config.clone()).unwrap().load("b.tpl").unwrap();
    let same_pipeline = first.load("b.tpl").unwrap();
    let cold_config = config.with_cache_dir(dir.path().join("cold"));
    let cold = Pipeline::new(cold_config).unwrap().load("b.tpl").unwrap();

    assert_eq!(sorted_keys(&cold.sections), vec!["a", "b"]);
    assert_eq!(cold.values["owner"], "b");
    for warm in [&after_a, &same_pipeline] {
        assert_eq!(sorted_keys(&warm.sections), sorted_keys(&cold.sections));
        assert_eq!(sorted_keys(&warm.values), sorted_keys(&cold.values));
        assert_eq!(warm.values["owner"], "b");
    }
    assert!(is_fresh(&first, &b));
}

#[test]
fn memory_layer_is_trusted_until_cleared() {
    let (_dir, views, config) = setup();
    let page = write_template(&views, "page.tpl", "@value v 1\n");

    let mut pipeline = Pipeline::new(config).unwrap();
    assert_eq!(pipeline.load("page.tpl").unwrap().values["v"], "1");

    fs::write(&page, "@value v 2\n").unwrap();
    set_mtime(&page, 4_000_000);
    assert_eq!(pipeline.load("page.tpl").unwrap().values["v"], "1");

    pipeline.clear_memory();
    assert_eq!(pipeline.load("page.tpl").unwrap().values["v"], "2");
}

#[test]
fn absolute_references_bypass_base_dir() {
    let (dir, views, config) = setup();
    let elsewhere = dir.path().join("elsewhere.tpl");
    fs::write(&elsewhere, "outside").unwrap();
    write_template(&views, "page.tpl", &format!("@include {}\n", elsewhere.display()));

    let mut pipeline = Pipeline::new(config).unwrap();
    let artifact = pipeline.load("page.tpl").unwrap();
    assert!(artifact.sections[DEFAULT_SECTION]
        .to_string_lossy()
        .contains("elsewhere.tpl#@main"));
}

#[test]
fn missing_template_is_not_found() {
    let (_dir, _views, config) = setup();
    let mut pipeline = Pipeline::new(config).unwrap();
    match pipeline.load("nope.tpl") {
        Err(Error::NotFound { reference }) => assert_eq!(reference, "nope.tpl"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn missing_nested_include_names_both_files() {
    let (_dir, views, config) = setup();
    write_template(&views, "page.tpl", "@include mid.tpl\n");
    let mid = write_template(&views, "mid.tpl", "@include gone.tpl\n");

    let mut pipeline = Pipeline::new(config).unwrap();
    match pipeline.load("page.tpl") {
        Err(Error::IncludeNotFound { target, includer }) => {
            assert_eq!(target, "gone.tpl");
            assert_eq!(includer, mid);
        }
        other => panic!("Expected IncludeNotFound, got {:?}", other),
    }
}

#[test]
fn sidecar_records_source_metadata() {
    let (_dir, views, config) = setup();
    let page = write_template(&views, "page.tpl", "@value k v\n");

    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline.load("page.tpl").unwrap();

    let raw = fs::read_to_string(pipeline.store().sidecar_path(&page)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["sourcePath"], page.to_str().unwrap());
    assert_eq!(json["sourceModTime"], Duration::from_secs(1_000_000).as_nanos() as u64);
    assert_eq!(json["values"]["k"], "v");
}
