// tests/ignore_rules.rs

use std::path::Path;

use globset::Glob;
use regex::Regex;

use watchcmd::types::{LiteralMatch, WatchEvent};
use watchcmd::watch::{IgnoreSpec, is_ignored, should_forward};
use watchcmd_test_utils::init_tracing;

fn glob(pattern: &str) -> IgnoreSpec {
    IgnoreSpec::Glob(Glob::new(pattern).unwrap().compile_matcher())
}

#[test]
fn substring_literal_matches_anywhere_in_path() {
    init_tracing();
    let spec = IgnoreSpec::literal("node_modules", LiteralMatch::Substring);

    assert!(is_ignored(Path::new("/proj/node_modules/lib/index.js"), &spec));
    assert!(!is_ignored(Path::new("/proj/src/index.js"), &spec));
}

#[test]
fn exact_literal_requires_whole_path() {
    let spec = IgnoreSpec::literal("build", LiteralMatch::Exact);

    assert!(spec.matches(Path::new("/proj/build"), Some("build")));
    assert!(!spec.matches(Path::new("/proj/build/out.js"), Some("build/out.js")));
    assert!(spec.matches(Path::new("build"), None));
}

#[test]
fn regex_rule_checks_absolute_and_relative_forms() {
    let anchored = IgnoreSpec::Regex(Regex::new(r"^\.git/").unwrap());

    // Only the relative form starts with `.git/`.
    assert!(anchored.matches(Path::new("/proj/.git/HEAD"), Some(".git/HEAD")));
    assert!(!anchored.is_ignored(Path::new("/proj/.git/HEAD")));
    assert!(!anchored.matches(Path::new("/proj/src/git.rs"), Some("src/git.rs")));
}

#[test]
fn glob_rule_matches_relative_path() {
    let spec = glob("**/*.swp");

    assert!(spec.matches(Path::new("/proj/src/.main.rs.swp"), Some("src/.main.rs.swp")));
    assert!(!spec.matches(Path::new("/proj/src/main.rs"), Some("src/main.rs")));
}

#[test]
fn predicate_rule_and_failing_predicate() {
    let hidden = IgnoreSpec::predicate(|p: &Path| {
        Ok(p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.')))
    });
    assert!(hidden.is_ignored(Path::new("/proj/.env")));
    assert!(!hidden.is_ignored(Path::new("/proj/env")));

    let broken = IgnoreSpec::predicate(|_: &Path| Err(anyhow::anyhow!("boom")));
    assert!(!broken.is_ignored(Path::new("/proj/anything")));
}

#[test]
fn any_is_logical_or_and_empty_matches_nothing() {
    let spec = IgnoreSpec::Any(vec![
        IgnoreSpec::literal("node_modules", LiteralMatch::Substring),
        IgnoreSpec::Regex(Regex::new(r"\.log$").unwrap()),
        glob("**/*.tmp"),
        IgnoreSpec::predicate(|p: &Path| Ok(p.ends_with("secret.txt"))),
    ]);

    for ignored in [
        "/p/node_modules/a.js",
        "/p/logs/out.log",
        "/p/cache/x.tmp",
        "/p/docs/secret.txt",
    ] {
        assert!(spec.is_ignored(Path::new(ignored)), "{ignored} should be ignored");
    }
    assert!(!spec.is_ignored(Path::new("/p/src/main.rs")));

    assert!(!IgnoreSpec::default().is_ignored(Path::new("/p/anything")));
}

#[test]
fn watcher_filter_drops_ignored_paths_and_root() {
    let root = Path::new("/proj");
    let spec = IgnoreSpec::literal("target", LiteralMatch::Substring);

    assert!(should_forward(root, &spec, &WatchEvent::change("/proj/src/lib.rs")));
    assert!(!should_forward(root, &spec, &WatchEvent::change("/proj/target/debug/x")));
    assert!(!should_forward(root, &spec, &WatchEvent::change("/proj")));
}
