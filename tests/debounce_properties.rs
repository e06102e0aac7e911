// tests/debounce_properties.rs

use std::collections::HashMap;
use std::path::PathBuf;

use proptest::prelude::*;
use tokio::time::{Duration, Instant};

use watchcmd::types::{EventKind, WatchEvent};
use watchcmd::watch::Debouncer;

fn kind_strategy() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just(EventKind::Add),
        Just(EventKind::Change),
        Just(EventKind::Unlink),
    ]
}

proptest! {
    /// Whatever the interleaving, a flush after the last window closes holds
    /// exactly one entry per touched path, carrying that path's latest kind.
    #[test]
    fn one_entry_per_path_with_latest_kind(
        events in proptest::collection::vec((0..5usize, kind_strategy(), 0..200u64), 1..60),
        delay_ms in 1..400u64,
    ) {
        let delay = Duration::from_millis(delay_ms);
        let mut debouncer = Debouncer::new(delay);
        let mut now = Instant::now();
        let mut latest: HashMap<PathBuf, EventKind> = HashMap::new();
        let mut flushed: HashMap<PathBuf, usize> = HashMap::new();

        for (path_idx, kind, gap) in events {
            now += Duration::from_millis(gap);
            for event in debouncer.flush_ready(now).events() {
                *flushed.entry(event.path).or_default() += 1;
            }

            let path = PathBuf::from(format!("/p/file{path_idx}"));
            latest.insert(path.clone(), kind);
            flushed.remove(&path);
            prop_assert!(debouncer.register(WatchEvent::new(kind, path), now).is_none());
        }

        let last = debouncer.flush_ready(now + delay);
        prop_assert!(debouncer.is_empty());

        for event in last.events() {
            prop_assert_eq!(Some(&event.kind), latest.get(&event.path));
            prop_assert!(!flushed.contains_key(&event.path));
        }
    }
}
