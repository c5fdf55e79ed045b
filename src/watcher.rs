//! File watcher: observes the workspace directories and triggers a full
//! reload whenever a content file is created or written. Events are handled
//! one at a time; reloads are cheap enough that no coalescing is done.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use notify::{
    Config,
    Event,
    EventKind,
    RecommendedWatcher,
    RecursiveMode,
    Watcher,
    event::ModifyKind,
};
use tracing::{debug, error, warn};

use crate::{error::Result, store::StoreSet};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const WATCHED_EXTENSIONS: &[&str] = &["md", "json", "sql"];

/// Reacts to a relevant filesystem change. The store set is the production
/// implementation; tests substitute counters.
pub trait ReloadHandler: Send + Sync + 'static {
    fn reload_all(&self) -> Result<()>;
}

impl ReloadHandler for StoreSet {
    fn reload_all(&self) -> Result<()> {
        StoreSet::reload_all(self)
    }
}

/// A running watcher thread. Stops cooperatively on [`FileWatcher::stop`]
/// or drop.
pub struct FileWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FileWatcher {
    /// Register non-recursive watches on each directory and start the event
    /// loop on its own thread. A directory that cannot be watched is logged
    /// and skipped so one bad path does not take the whole watcher down.
    pub fn spawn(
        dirs: &[std::path::PathBuf],
        handler: Arc<dyn ReloadHandler>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        for dir in dirs {
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                warn!(dir = %dir.display(), error = %e, "failed to watch directory");
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("lore-watcher".to_string())
            .spawn(move || {
                // Keep the watcher alive for the lifetime of the loop.
                let _watcher = watcher;
                event_loop(&rx, &stop_flag, handler.as_ref());
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Signal the watcher thread to exit and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn event_loop(
    rx: &mpsc::Receiver<notify::Result<Event>>,
    stop: &AtomicBool,
    handler: &dyn ReloadHandler,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if !is_relevant(&event) {
                    continue;
                }
                debug!(paths = ?event.paths, "relevant change, reloading");
                if let Err(e) = handler.reload_all() {
                    error!(error = %e, "reload failed");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// A change matters when it is a create or a content write touching a
/// non-hidden, non-temporary file with a watched extension.
pub fn is_relevant(event: &Event) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    );
    kind_matches && event.paths.iter().any(|p| is_relevant_path(p))
}

fn is_relevant_path(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if !crate::store::is_content_file(&name) {
        return false;
    }
    path.extension().is_some_and(|ext| {
        WATCHED_EXTENSIONS
            .iter()
            .any(|w| ext.eq_ignore_ascii_case(w))
    })
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::atomic::AtomicUsize,
        time::Instant,
    };

    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    use super::*;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn accepts_create_and_data_write_of_content_files() {
        for path in ["lore/rules/a.md", "lore/history/x.json", "db/schema.sql"]
        {
            assert!(is_relevant(&event(
                EventKind::Create(CreateKind::File),
                path
            )));
            assert!(is_relevant(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                path
            )));
            assert!(is_relevant(&event(
                EventKind::Modify(ModifyKind::Any),
                path
            )));
        }
    }

    #[test]
    fn rejects_irrelevant_events() {
        // Wrong kind.
        assert!(!is_relevant(&event(
            EventKind::Remove(RemoveKind::File),
            "lore/rules/a.md"
        )));
        assert!(!is_relevant(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
            "lore/rules/a.md"
        )));
        assert!(!is_relevant(&event(EventKind::Access(
            notify::event::AccessKind::Any
        ), "lore/rules/a.md")));

        // Wrong path.
        let create = EventKind::Create(CreateKind::File);
        assert!(!is_relevant(&event(create, "lore/rules/.hidden.md")));
        assert!(!is_relevant(&event(create, "lore/rules/a.md~")));
        assert!(!is_relevant(&event(create, "lore/rules/a.swp")));
        assert!(!is_relevant(&event(create, "lore/rules/a.tmp")));
        assert!(!is_relevant(&event(create, "lore/rules/notes.txt")));
        assert!(!is_relevant(&event(create, "lore/rules")));
    }

    struct Counter(AtomicUsize);

    impl ReloadHandler for Counter {
        fn reload_all(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn write_triggers_reload_within_bounded_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = Arc::new(Counter(AtomicUsize::new(0)));

        let mut watcher = FileWatcher::spawn(
            &[tmp.path().to_path_buf()],
            Arc::clone(&handler) as Arc<dyn ReloadHandler>,
        )
        .unwrap();

        std::fs::write(tmp.path().join("rule.md"), "# Rule\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handler.0.load(Ordering::SeqCst) == 0
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(handler.0.load(Ordering::SeqCst) >= 1);

        watcher.stop();
    }

    #[test]
    fn irrelevant_files_do_not_trigger() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = Arc::new(Counter(AtomicUsize::new(0)));

        let mut watcher = FileWatcher::spawn(
            &[tmp.path().to_path_buf()],
            Arc::clone(&handler) as Arc<dyn ReloadHandler>,
        )
        .unwrap();

        std::fs::write(tmp.path().join("scratch.tmp"), "x").unwrap();
        thread::sleep(Duration::from_millis(500));
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);

        watcher.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = Arc::new(Counter(AtomicUsize::new(0)));
        let mut watcher = FileWatcher::spawn(
            &[tmp.path().to_path_buf()],
            handler as Arc<dyn ReloadHandler>,
        )
        .unwrap();
        watcher.stop();
        watcher.stop();
    }
}
