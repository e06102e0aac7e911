// tests/watcher_events.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind as NotifyKind};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use watchcmd::types::{EventKind, LiteralMatch, WatchEvent};
use watchcmd::watch::{IgnoreSpec, classify, spawn_watcher};
use watchcmd_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn event(kind: NotifyKind, paths: &[&str]) -> Event {
    paths
        .iter()
        .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
}

#[test]
fn create_modify_remove_map_to_add_change_unlink() {
    init_tracing();

    let created = classify(&event(NotifyKind::Create(CreateKind::File), &["/nx/a.txt"]));
    assert_eq!(created, vec![WatchEvent::add("/nx/a.txt")]);

    let modified = classify(&event(
        NotifyKind::Modify(ModifyKind::Data(DataChange::Content)),
        &["/nx/a.txt"],
    ));
    assert_eq!(modified, vec![WatchEvent::change("/nx/a.txt")]);

    let removed = classify(&event(NotifyKind::Remove(RemoveKind::File), &["/nx/a.txt"]));
    assert_eq!(removed, vec![WatchEvent::unlink("/nx/a.txt")]);
}

#[test]
fn renames_become_unlink_plus_add() {
    let both = classify(&event(
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
        &["/nx/old.txt", "/nx/new.txt"],
    ));
    assert_eq!(
        both,
        vec![WatchEvent::unlink("/nx/old.txt"), WatchEvent::add("/nx/new.txt")]
    );

    let from = classify(&event(
        NotifyKind::Modify(ModifyKind::Name(RenameMode::From)),
        &["/nx/old.txt"],
    ));
    assert_eq!(from, vec![WatchEvent::unlink("/nx/old.txt")]);

    let to = classify(&event(
        NotifyKind::Modify(ModifyKind::Name(RenameMode::To)),
        &["/nx/new.txt"],
    ));
    assert_eq!(to, vec![WatchEvent::add("/nx/new.txt")]);
}

#[test]
fn access_and_metadata_events_are_dropped() {
    let access = classify(&event(NotifyKind::Access(AccessKind::Any), &["/nx/a.txt"]));
    assert!(access.is_empty());

    let metadata = classify(&event(
        NotifyKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
        &["/nx/a.txt"],
    ));
    assert!(metadata.is_empty());
}

#[test]
fn directory_changes_are_not_file_events() -> TestResult {
    let dir = tempfile::tempdir()?;
    let sub = dir.path().join("sub");
    fs::create_dir(&sub)?;
    let sub = sub.to_string_lossy().into_owned();

    assert!(classify(&event(NotifyKind::Create(CreateKind::Folder), &[sub.as_str()])).is_empty());
    assert_eq!(
        classify(&event(NotifyKind::Remove(RemoveKind::Folder), &[sub.as_str()])),
        vec![WatchEvent::unlink(sub.as_str())]
    );
    Ok(())
}

#[tokio::test]
async fn watcher_forwards_changes_and_skips_ignored_paths() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    fs::create_dir(root.join("skipme"))?;

    let ignore = IgnoreSpec::literal("skipme", LiteralMatch::Substring);
    let (raw_tx, mut raw_rx) = mpsc::channel(256);
    let _watcher = spawn_watcher(&root, ignore, raw_tx)?;

    // Give the backend a moment to arm the watch.
    tokio::time::sleep(Duration::from_millis(200)).await;

    fs::write(root.join("skipme").join("junk.bin"), b"junk")?;
    let target = root.join("page.html");
    fs::write(&target, b"<p>hi</p>")?;

    let seen = with_timeout(async {
        let mut seen = Vec::new();
        while let Some(event) = raw_rx.recv().await {
            let done = event.path == target;
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    })
    .await;

    assert!(seen.iter().all(|e| !e.path.starts_with(root.join("skipme"))));
    let last = seen.last().ok_or("no events")?;
    assert!(matches!(last.kind, EventKind::Add | EventKind::Change));

    // Nothing from the ignored directory trickles in later either.
    while let Ok(Some(event)) = timeout(Duration::from_millis(300), raw_rx.recv()).await {
        assert!(!event.path.starts_with(root.join("skipme")), "{event:?}");
    }
    Ok(())
}
