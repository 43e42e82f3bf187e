//! Directory watching with per-path settle delays.
//!
//! A [`DirectoryWatcher`] subscribes to create/modify events on its
//! configured folders (non-recursively), drops paths matching the ignore
//! list, and hands every other file to the [`ContentSniffer`]. The
//! resulting [`DetectionRecord`] is passed by value to the registered
//! callback, whether it is suspicious, safe or an error.
//!
//! One background thread owns the filesystem subscription. It multiplexes
//! incoming events with a [`SettleQueue`] of per-path deadlines, so a modify
//! event waiting out its settle delay never holds back other paths.
//!
//! # Callback contract
//!
//! The callback runs on the watcher thread. It must return quickly: long
//! blocking work delays every later record. Forward records to another
//! thread (see [`forward_to`]) when consumers are slow. Panics inside the
//! callback are caught, logged and counted; monitoring continues.

use crate::core::config::WatchConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{DetectionRecord, IgnorePolicy, WatchTarget, WatcherState};
use crate::scanner::sniffer::ContentSniffer;
use crate::scanner::stats::{StatsSnapshot, WatchStats};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Callback receiving one record per analysed file.
pub type DetectionCallback = Arc<dyn Fn(DetectionRecord) + Send + Sync>;

/// How long `add_watch_folder` waits for the worker to subscribe a folder.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a callback that forwards records into an async channel.
///
/// Records sent after the receiver is dropped are discarded.
pub fn forward_to(tx: tokio::sync::mpsc::UnboundedSender<DetectionRecord>) -> DetectionCallback {
    Arc::new(move |record| {
        if let Err(e) = tx.send(record) {
            log::debug!("Detection receiver closed, dropping record for {}", e.0.file_name());
        }
    })
}

/// Filesystem change relevant to analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// A file appeared; analysed immediately
    Created,
    /// A file changed; analysed after the settle delay
    Modified,
}

/// Translate a raw notify event into the changes we act on.
pub fn translate_event(event: &Event) -> Vec<(FsEventKind, PathBuf)> {
    let all = |kind: FsEventKind| -> Vec<(FsEventKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => all(FsEventKind::Created),
        // A file renamed into place (e.g. a finished download) is new to us.
        // `Both` is skipped: backends that emit it also emit `To`.
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(FsEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|p| p.exists())
            .map(|p| (FsEventKind::Modified, p.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => Vec::new(),
        // Reading a file touches its metadata; reacting to that would loop.
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => all(FsEventKind::Modified),
        _ => Vec::new(),
    }
}

/// Per-path settle deadlines.
///
/// Scheduling a path that is already pending moves its deadline, so a burst
/// of writes produces one analysis once the file has been quiet for the
/// whole delay.
#[derive(Debug, Default)]
pub struct SettleQueue {
    pending: HashMap<PathBuf, Instant>,
}

impl SettleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or move) the deadline for a path.
    pub fn schedule(&mut self, path: PathBuf, deadline: Instant) {
        self.pending.insert(path, deadline);
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return the paths whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<(PathBuf, Instant)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, deadline)| (path.clone(), *deadline))
            .collect();
        due.sort_by_key(|(_, deadline)| *deadline);
        for (path, _) in &due {
            self.pending.remove(path);
        }
        due.into_iter().map(|(path, _)| path).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Messages consumed by the worker thread.
enum WorkerMessage {
    Event(FsEventKind, PathBuf),
    Subscribe {
        path: PathBuf,
        reply: mpsc::SyncSender<Result<()>>,
    },
    Shutdown,
}

/// Handle on a running worker thread.
struct WorkerHandle {
    tx: Sender<WorkerMessage>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }
}

/// Watches folders and reports every new or changed file.
pub struct DirectoryWatcher {
    config: WatchConfig,
    sniffer: Arc<ContentSniffer>,
    ignore: Arc<IgnorePolicy>,
    callback: DetectionCallback,
    targets: RwLock<Vec<WatchTarget>>,
    state: Mutex<WatcherState>,
    running: Arc<AtomicBool>,
    stats: Arc<WatchStats>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl DirectoryWatcher {
    /// Create a watcher using the built-in sniffer.
    pub fn new<F>(config: WatchConfig, callback: F) -> Self
    where
        F: Fn(DetectionRecord) + Send + Sync + 'static,
    {
        let sniffer = ContentSniffer::from_config(&config);
        Self::with_sniffer(config, sniffer, Arc::new(callback))
    }

    /// Create a watcher with a specific sniffer and callback.
    pub fn with_sniffer(
        config: WatchConfig,
        sniffer: ContentSniffer,
        callback: DetectionCallback,
    ) -> Self {
        let ignore = IgnorePolicy::new(&config.ignore_extensions);
        let targets = config.folders.iter().map(WatchTarget::resolve).collect();
        Self {
            config,
            sniffer: Arc::new(sniffer),
            ignore: Arc::new(ignore),
            callback,
            targets: RwLock::new(targets),
            state: Mutex::new(WatcherState::Stopped),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(WatchStats::new()),
            worker: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatcherState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(WatcherState::Stopped)
    }

    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    /// Snapshot of the configured folders.
    pub fn watched_folders(&self) -> Vec<WatchTarget> {
        self.targets
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn ignore_policy(&self) -> &IgnorePolicy {
        &self.ignore
    }

    /// Start watching.
    ///
    /// Missing folders are logged and skipped. Failing to establish the
    /// filesystem subscription is the only error. Calling `start` while not
    /// stopped does nothing.
    pub fn start(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::lock_poisoned("watcher state"))?;
        if *state != WatcherState::Stopped {
            log::debug!("start() ignored, watcher is {}", *state);
            return Ok(());
        }
        *state = WatcherState::Starting;

        match self.spawn_worker() {
            Ok(()) => {
                *state = WatcherState::Running;
                log::info!("File monitor is running");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                *state = WatcherState::Stopped;
                log::error!("Failed to start file monitor: {}", e);
                Err(e)
            }
        }
    }

    /// Stop watching and wait for the worker thread to exit.
    ///
    /// Pending settle deadlines are abandoned. Calling `stop` while not
    /// running does nothing.
    pub fn stop(&self) {
        {
            let Ok(mut state) = self.state.lock() else {
                log::error!("Watcher state lock poisoned, cannot stop cleanly");
                return;
            };
            if *state != WatcherState::Running {
                return;
            }
            *state = WatcherState::Stopping;
        }
        // The state lock is released while joining so the callback can still
        // query the watcher; start() is a no-op while Stopping.
        self.running.store(false, Ordering::SeqCst);

        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let _ = handle.tx.send(WorkerMessage::Shutdown);
            if handle.thread_id() == thread::current().id() {
                // Called from the callback; the loop exits once it returns.
                log::debug!("stop() called from the watcher thread, not joining");
            } else if handle.thread.join().is_err() {
                log::error!("Watcher thread panicked during shutdown");
            }
        }

        if let Ok(mut state) = self.state.lock() {
            *state = WatcherState::Stopped;
        }
        log::info!("File monitor stopped");
    }

    /// Add a folder to the watch list.
    ///
    /// Returns `Ok(false)` if the folder is already listed. When running, an
    /// existing folder is subscribed immediately; a missing one is kept and
    /// retried on the next start.
    pub fn add_watch_folder(&self, path: impl Into<PathBuf>) -> Result<bool> {
        let target = WatchTarget::resolve(path);
        {
            let mut targets = self
                .targets
                .write()
                .map_err(|_| Error::lock_poisoned("watch targets"))?;
            if targets.iter().any(|t| t.path == target.path) {
                return Ok(false);
            }
            targets.push(target.clone());
        }

        if !target.exists {
            log::warn!("Folder not found, will retry on next start: {:?}", target.path);
            return Ok(true);
        }

        let worker = match self.worker.lock() {
            Ok(worker) if self.running.load(Ordering::SeqCst) => {
                worker.as_ref().map(|w| (w.tx.clone(), w.thread_id()))
            }
            _ => None,
        };
        let Some((tx, worker_id)) = worker else {
            log::info!("Added watch folder: {:?}", target.path);
            return Ok(true);
        };

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let message = WorkerMessage::Subscribe {
            path: target.path.clone(),
            reply: reply_tx,
        };
        if tx.send(message).is_err() {
            // Worker exited between the check and the send; next start picks it up.
            return Ok(true);
        }
        if worker_id == thread::current().id() {
            // Called from the callback: the worker handles the request after
            // the callback returns, so there is no reply to wait for.
            return Ok(true);
        }
        match reply_rx.recv_timeout(SUBSCRIBE_TIMEOUT) {
            Ok(result) => result.map(|_| true),
            Err(_) => Err(Error::watch_subscription(format!(
                "timed out subscribing {:?}",
                target.path
            ))),
        }
    }

    /// Re-check targets, subscribe, and launch the worker thread.
    ///
    /// The target list stays locked until the worker handle is installed, so
    /// a concurrent `add_watch_folder` is either in the initial list or sees
    /// a running worker to subscribe through.
    fn spawn_worker(&self) -> Result<()> {
        let mut targets = self
            .targets
            .write()
            .map_err(|_| Error::lock_poisoned("watch targets"))?;
        for target in targets.iter_mut() {
            *target = WatchTarget::resolve(target.path.clone());
        }

        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();
        let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for (kind, path) in translate_event(&event) {
                        if event_tx.send(WorkerMessage::Event(kind, path)).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => log::warn!("Filesystem watcher error: {}", e),
            }
        })?;

        for target in targets.iter() {
            if !target.exists {
                log::warn!("Folder not found, skipping: {:?}", target.path);
                continue;
            }
            match fs_watcher.watch(&target.path, RecursiveMode::NonRecursive) {
                Ok(()) => log::info!("Monitoring: {:?}", target.path),
                Err(e) if matches!(e.kind, notify::ErrorKind::PathNotFound) => {
                    log::warn!("Folder vanished before subscribing, skipping: {:?}", target.path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut slot = self
            .worker
            .lock()
            .map_err(|_| Error::lock_poisoned("watcher worker"))?;
        self.running.store(true, Ordering::SeqCst);
        let worker = Worker {
            rx,
            fs_watcher,
            sniffer: Arc::clone(&self.sniffer),
            ignore: Arc::clone(&self.ignore),
            callback: Arc::clone(&self.callback),
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
            settle_delay: self.config.settle_delay(),
            queue: SettleQueue::new(),
        };

        let thread = thread::Builder::new()
            .name("magic-eye-watcher".to_string())
            .spawn(move || worker.run())
            .map_err(|e| Error::Internal(format!("Failed to spawn watcher thread: {}", e)))?;

        *slot = Some(WorkerHandle { tx, thread });
        drop(slot);
        drop(targets);
        Ok(())
    }

    /// Feed a synthetic event to the worker, bypassing the OS.
    #[cfg(test)]
    fn inject(&self, kind: FsEventKind, path: &Path) {
        let worker = self.worker.lock().unwrap();
        let handle = worker.as_ref().expect("watcher not running");
        handle
            .tx
            .send(WorkerMessage::Event(kind, path.to_path_buf()))
            .unwrap();
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread.
struct Worker {
    rx: Receiver<WorkerMessage>,
    fs_watcher: RecommendedWatcher,
    sniffer: Arc<ContentSniffer>,
    ignore: Arc<IgnorePolicy>,
    callback: DetectionCallback,
    running: Arc<AtomicBool>,
    stats: Arc<WatchStats>,
    settle_delay: Duration,
    queue: SettleQueue,
}

impl Worker {
    fn run(mut self) {
        log::debug!("Watcher thread started");

        loop {
            let message = match self.queue.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.rx.recv_timeout(wait) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.rx.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            match message {
                Some(WorkerMessage::Shutdown) => break,
                Some(WorkerMessage::Event(kind, path)) => self.handle_event(kind, path),
                Some(WorkerMessage::Subscribe { path, reply }) => {
                    let result = self
                        .fs_watcher
                        .watch(&path, RecursiveMode::NonRecursive)
                        .map_err(Error::from);
                    if result.is_ok() {
                        log::info!("Monitoring: {:?}", path);
                    }
                    let _ = reply.send(result);
                }
                None => {}
            }

            for path in self.queue.take_due(Instant::now()) {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                self.dispatch(&path);
            }
        }

        if !self.queue.is_empty() {
            log::debug!("Abandoning {} pending settle timer(s)", self.queue.len());
            self.queue.clear();
        }
        log::debug!("Watcher thread exiting");
    }

    fn handle_event(&mut self, kind: FsEventKind, path: PathBuf) {
        if self.ignore.is_ignored(&path) {
            log::debug!("Ignoring temp file: {:?}", path);
            self.stats.increment_ignored();
            return;
        }
        if path.is_dir() {
            return;
        }

        match kind {
            // An empty new file is still being written; wait for the data.
            FsEventKind::Created if is_empty_file(&path) => {
                log::debug!("Empty file created, settling: {:?}", path);
                self.queue.schedule(path, Instant::now() + self.settle_delay);
            }
            FsEventKind::Created => {
                log::debug!("File created: {:?}", path);
                self.dispatch(&path);
            }
            FsEventKind::Modified => {
                log::debug!("File modified, settling for {:?}: {:?}", self.settle_delay, path);
                self.queue.schedule(path, Instant::now() + self.settle_delay);
            }
        }
    }

    /// Analyse a path and hand the record to the callback.
    fn dispatch(&self, path: &Path) {
        let record = self.sniffer.analyze(path);
        self.stats.record(&record);

        if let Some(err) = record.error() {
            log::warn!("Error analyzing {}: {}", record.file_name(), err);
        } else if record.is_suspicious() {
            log::warn!(
                "SUSPICIOUS FILE: {} (claims .{}, content is .{})",
                record.file_name(),
                record.current_extension().unwrap_or_default(),
                record.true_extension().unwrap_or_default()
            );
        } else {
            log::info!("Safe file: {}", record.file_name());
        }

        let callback = &self.callback;
        if panic::catch_unwind(AssertUnwindSafe(|| callback(record))).is_err() {
            self.stats.increment_callback_failures();
            log::error!("Detection callback panicked for {:?}; monitoring continues", path);
        }
    }
}

fn is_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() == 0)
        .unwrap_or(false)
}
