// Load orchestration
//
// LoadService routes a listing into the queue and runs the pass either on the
// caller's thread or on a background worker that reports progress through
// channels.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::engine::{DynEngine, EngineTarget};
use crate::io::FileProvider;
use crate::metrics::Metrics;
use crate::models::{FileFlags, LoaderSettings};
use crate::parsers::ParseContext;
use crate::routing::{FileRouter, RoutePlan, RuleSet};

use super::{LoadError, LoadEvent, LoadOutcome, LoadProgress, LoadQueue};

/// Called once at the end of every pass.
pub type CompletionCallback = Arc<dyn Fn(&LoadOutcome) + Send + Sync>;

/// State shared between the service and its background worker.
struct Shared {
    queue: Mutex<LoadQueue>,
    progress_tx: watch::Sender<LoadProgress>,
    events_tx: broadcast::Sender<LoadEvent>,
    callbacks: Mutex<Vec<CompletionCallback>>,
    running: AtomicBool,
    metrics: Arc<Metrics>,
}

/// What one background step did.
struct StepReport {
    path: String,
    step: usize,
    done: bool,
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, LoadQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: LoadEvent) {
        // send() only fails when nobody is subscribed
        let delivered = self.events_tx.send(event).is_ok();
        self.metrics.record_event(delivered);
    }

    /// Publishes the queue counters. Callers hold the queue lock, so a reset
    /// can never be overtaken by a stale snapshot.
    fn publish(&self, queue: &LoadQueue) {
        let snapshot = queue.snapshot();
        self.progress_tx.send_replace(snapshot.clone());
        self.emit(LoadEvent::Progress(snapshot));
    }

    /// Runs one step of the queue against a shared engine.
    fn step_shared<E: EngineTarget + 'static>(
        &self,
        engine: &RwLock<E>,
    ) -> Result<Option<StepReport>, LoadError> {
        let mut queue = self.lock_queue();
        let Some(path) = queue.current_path().map(str::to_string) else {
            return Ok(None);
        };
        let step = queue.completed_steps();

        {
            let mut engine = engine.write().unwrap_or_else(|e| e.into_inner());
            queue.step_one(&mut *engine)?;
        }

        self.metrics.record_step();
        self.publish(&queue);
        Ok(Some(StepReport {
            path,
            step,
            done: queue.is_empty(),
        }))
    }

    fn finish(&self, outcome: LoadOutcome, started: Instant) {
        let elapsed = started.elapsed();
        match &outcome {
            LoadOutcome::Completed => tracing::info!("Load pass completed in {:?}", elapsed),
            LoadOutcome::Failed(e) => tracing::error!("Load pass failed after {:?}: {}", elapsed, e),
            LoadOutcome::Cancelled => tracing::warn!("Load pass cancelled after {:?}", elapsed),
        }
        self.metrics.record_outcome(&outcome, elapsed);
        self.running.store(false, Ordering::Release);
        self.emit(LoadEvent::Finished(outcome.clone()));

        let callbacks: Vec<CompletionCallback> = self
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in callbacks {
            // callback panics are logged, never propagated
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&outcome))).is_err() {
                tracing::error!("Completion callback panicked");
            }
        }
    }
}

/// Handle to a background pass.
pub struct LoadHandle {
    join: JoinHandle<LoadOutcome>,
    progress: watch::Receiver<LoadProgress>,
    plan: RoutePlan,
}

impl LoadHandle {
    /// Routes the pass is executing.
    pub fn plan(&self) -> &RoutePlan {
        &self.plan
    }

    pub fn progress(&self) -> watch::Receiver<LoadProgress> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the pass to end.
    pub async fn wait(self) -> LoadOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => LoadOutcome::Failed(Arc::new(LoadError::BackgroundFault(e.to_string()))),
        }
    }
}

/// Entry point for load passes.
///
/// Owns the router, the file provider (through the parse context), the queue and
/// the progress/event channels. At most one pass runs at a time; starting another
/// while one is outstanding fails with [`LoadError::AlreadyRunning`].
///
/// # Example
/// ```ignore
/// let service = LoadService::new(provider, LoaderSettings::default(), Handle::current());
/// service.on_complete(|outcome| println!("done: {outcome:?}"));
/// let files = service.list_files()?;
/// let pass = service.start_background_load(&files, engine.clone(), FileFlags::all())?;
/// let outcome = pass.wait().await;
/// ```
pub struct LoadService {
    router: FileRouter,
    context: ParseContext,
    settings: LoaderSettings,
    handle: Handle,
    shared: Arc<Shared>,
    cancel_tx: watch::Sender<bool>,
}

impl LoadService {
    pub fn new(files: Arc<dyn FileProvider>, settings: LoaderSettings, handle: Handle) -> Self {
        let router = FileRouter::new(RuleSet::standard(&settings))
            .with_report_unmatched(settings.report_unmatched);
        let context = ParseContext::new(files).with_mask(settings.mask_rgb());
        let (progress_tx, _) = watch::channel(LoadProgress::default());
        let (events_tx, _) = broadcast::channel(settings.progress_channel_capacity.max(1));
        let (cancel_tx, _) = watch::channel(false);

        Self {
            router,
            context,
            settings,
            handle,
            shared: Arc::new(Shared {
                queue: Mutex::new(LoadQueue::new()),
                progress_tx,
                events_tx,
                callbacks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                metrics: Arc::new(Metrics::new()),
            }),
            cancel_tx,
        }
    }

    /// Replaces the routing table.
    pub fn with_router(mut self, router: FileRouter) -> Self {
        self.router = router;
        self
    }

    /// Replaces the parse context (decoders, mask color, provider).
    pub fn with_context(mut self, context: ParseContext) -> Self {
        self.context = context;
        self
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn router(&self) -> &FileRouter {
        &self.router
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Lists every file the provider exposes.
    pub fn list_files(&self) -> Result<Vec<String>, LoadError> {
        self.context.files.list().map_err(LoadError::Listing)
    }

    /// Routes and runs a whole pass on the calling thread.
    pub fn load_synchronously(
        &self,
        files: &[String],
        engine: &mut DynEngine,
        flags: FileFlags,
    ) -> Result<RoutePlan, Arc<LoadError>> {
        let (plan, started) = self.prepare(files, flags)?;

        let result = {
            let mut queue = self.shared.lock_queue();
            let before = queue.completed_steps();
            let result = queue.run_to_completion(engine);
            for _ in before..queue.completed_steps() {
                self.shared.metrics.record_step();
            }
            self.shared.publish(&queue);
            result
        };

        match result {
            Ok(()) => {
                self.shared.finish(LoadOutcome::Completed, started);
                Ok(plan)
            }
            Err(e) => {
                let e = Arc::new(e);
                self.shared.finish(LoadOutcome::Failed(Arc::clone(&e)), started);
                Err(e)
            }
        }
    }

    /// Routes on the calling thread, then steps the queue on a background worker.
    ///
    /// The engine is write-locked for one step at a time. Progress goes to the
    /// watch channel and to [`LoadEvent::Progress`] after every step.
    pub fn start_background_load<E>(
        &self,
        files: &[String],
        engine: Arc<RwLock<E>>,
        flags: FileFlags,
    ) -> Result<LoadHandle, Arc<LoadError>>
    where
        E: EngineTarget + 'static,
    {
        let (plan, started) = self.prepare(files, flags)?;

        let worker = self.handle.spawn(drive(
            Arc::clone(&self.shared),
            engine,
            self.cancel_tx.subscribe(),
            self.settings.step_yield(),
            self.settings.step_timeout(),
        ));

        // The supervisor turns a crashed worker into a reported failure.
        let shared = Arc::clone(&self.shared);
        let join = self.handle.spawn(async move {
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Background load worker crashed: {}", e);
                    LoadOutcome::Failed(Arc::new(LoadError::BackgroundFault(e.to_string())))
                }
            };
            shared.finish(outcome.clone(), started);
            outcome
        });

        Ok(LoadHandle {
            join,
            progress: self.shared.progress_tx.subscribe(),
            plan,
        })
    }

    /// Requests cancellation of the running pass. Takes effect before the next step.
    pub fn cancel(&self) {
        if self.is_running() {
            tracing::info!("Load cancellation requested");
        }
        self.cancel_tx.send_replace(true);
    }

    /// Cancels any running pass, empties the queue and zeroes progress.
    pub fn reset(&self) {
        self.cancel_tx.send_replace(true);
        let mut queue = self.shared.lock_queue();
        queue.reset();
        self.shared.progress_tx.send_replace(queue.snapshot());
    }

    /// Progress fraction of the current or last pass.
    pub fn progress(&self) -> f32 {
        self.shared.progress_tx.borrow().fraction()
    }

    pub fn percent(&self) -> u8 {
        self.shared.progress_tx.borrow().percent()
    }

    /// Path of the parser about to run, for preload screens.
    pub fn message(&self) -> Option<String> {
        self.shared.progress_tx.borrow().current.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Registers a callback fired once at the end of every pass.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: Fn(&LoadOutcome) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    /// Subscribes to pass events.
    pub fn subscribe(&self) -> broadcast::Receiver<LoadEvent> {
        self.shared.events_tx.subscribe()
    }

    pub fn watch_progress(&self) -> watch::Receiver<LoadProgress> {
        self.shared.progress_tx.subscribe()
    }

    /// Claims the pass slot, routes the listing and fills the queue.
    fn prepare(&self, files: &[String], flags: FileFlags) -> Result<(RoutePlan, Instant), Arc<LoadError>> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Err(Arc::new(LoadError::AlreadyRunning));
        }
        self.cancel_tx.send_replace(false);
        let started = Instant::now();

        let plan = self.router.route(files, flags);
        self.shared.metrics.record_pass_started(plan.len());

        let mut queue = self.shared.lock_queue();
        queue.reset();
        for parser in plan.parsers(&self.context) {
            if let Err(e) = queue.enqueue_parser(parser) {
                queue.reset();
                drop(queue);
                let e = Arc::new(e);
                self.shared.finish(LoadOutcome::Failed(Arc::clone(&e)), started);
                return Err(e);
            }
        }
        self.shared.publish(&queue);

        tracing::info!(
            "Starting load pass: {} parsers, {} steps",
            queue.len(),
            queue.total_steps()
        );
        self.shared.emit(LoadEvent::Started {
            parsers: queue.len(),
            total_steps: queue.total_steps(),
        });

        Ok((plan, started))
    }
}

/// Background driver: one step per iteration with a short yield in between.
async fn drive<E>(
    shared: Arc<Shared>,
    engine: Arc<RwLock<E>>,
    mut cancel_rx: watch::Receiver<bool>,
    step_yield: Duration,
    step_timeout: Option<Duration>,
) -> LoadOutcome
where
    E: EngineTarget + 'static,
{
    loop {
        let cancelled = *cancel_rx.borrow_and_update();
        if cancelled {
            return LoadOutcome::Cancelled;
        }

        let step_shared = Arc::clone(&shared);
        let step_engine = Arc::clone(&engine);
        let started = Instant::now();
        let result =
            tokio::task::spawn_blocking(move || step_shared.step_shared(&step_engine)).await;
        let elapsed = started.elapsed();

        let report = match result {
            Err(e) => {
                return LoadOutcome::Failed(Arc::new(LoadError::BackgroundFault(e.to_string())));
            }
            Ok(Err(e)) => return LoadOutcome::Failed(Arc::new(e)),
            // An empty queue after a reset is a cancellation, not a success
            Ok(Ok(None)) if *cancel_rx.borrow() => return LoadOutcome::Cancelled,
            Ok(Ok(None)) => return LoadOutcome::Completed,
            Ok(Ok(Some(report))) => report,
        };

        if let Some(limit) = step_timeout {
            if elapsed > limit {
                return LoadOutcome::Failed(Arc::new(LoadError::StepTimeout {
                    path: report.path,
                    step: report.step,
                    elapsed,
                    limit,
                }));
            }
        }

        if report.done {
            return LoadOutcome::Completed;
        }

        tokio::select! {
            _ = tokio::time::sleep(step_yield) => {}
            changed = cancel_rx.changed() => {
                // The service was dropped
                if changed.is_err() {
                    return LoadOutcome::Cancelled;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::io::MemoryFileSystem;
    use crate::models::Category;
    use std::sync::atomic::AtomicUsize;

    fn service(files: Vec<(&str, Vec<u8>)>) -> (LoadService, Vec<String>) {
        let fs = Arc::new(MemoryFileSystem::with_files(files));
        let service = LoadService::new(fs, LoaderSettings::default(), Handle::current());
        let listing = service.list_files().unwrap();
        (service, listing)
    }

    fn empty_sprites(n: usize) -> Vec<(String, Vec<u8>)> {
        (0..n)
            .map(|i| (format!("/Game/Sprites/s{i}.png"), Vec::new()))
            .collect()
    }

    #[tokio::test]
    async fn test_sync_pass_fires_callback_once() {
        let (service, files) = service(vec![("/Game/info.json", br#"{"a": "b"}"#.to_vec())]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        service.on_complete(move |outcome| {
            assert!(outcome.is_success());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut engine = MemoryEngine::new();
        let plan = service
            .load_synchronously(&files, &mut engine, Category::Meta.flag())
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(engine.meta["a"], "b");
        assert_eq!(service.progress(), 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_background_failure_is_reported() {
        let (service, files) = service(vec![("/Game/info.json", b"not json".to_vec())]);
        let engine = Arc::new(RwLock::new(MemoryEngine::new()));
        let mut events = service.subscribe();

        let outcome = service
            .start_background_load(&files, engine, Category::Meta.flag())
            .unwrap()
            .wait()
            .await;

        assert!(matches!(outcome.error(), Some(LoadError::Parse { step: 1, .. })));
        assert!(matches!(events.recv().await.unwrap(), LoadEvent::Progress(_)));
    }

    #[tokio::test]
    async fn test_second_pass_while_running_is_rejected() {
        let files: Vec<(String, Vec<u8>)> = empty_sprites(3);
        let fs = Arc::new(MemoryFileSystem::with_files(files));
        let settings = LoaderSettings {
            step_yield_ms: 50,
            ..LoaderSettings::default()
        };
        let service = LoadService::new(fs, settings, Handle::current());
        let listing = service.list_files().unwrap();
        let engine = Arc::new(RwLock::new(MemoryEngine::new()));

        let pass = service
            .start_background_load(&listing, Arc::clone(&engine), Category::Sprites.flag())
            .unwrap();
        let again = service.start_background_load(&listing, engine, FileFlags::all());
        assert!(matches!(again.err().as_deref(), Some(LoadError::AlreadyRunning)));

        service.cancel();
        assert!(matches!(pass.wait().await, LoadOutcome::Cancelled));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_panicking_callback_keeps_the_outcome() {
        let (service, files) = service(vec![("/Game/info.json", br#"{"a": "b"}"#.to_vec())]);
        let later = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later);
        service.on_complete(|_| panic!("callback failure"));
        service.on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut events = service.subscribe();

        let outcome = service
            .start_background_load(
                &files,
                Arc::new(RwLock::new(MemoryEngine::new())),
                Category::Meta.flag(),
            )
            .unwrap()
            .wait()
            .await;

        assert!(outcome.is_success());
        assert_eq!(later.load(Ordering::SeqCst), 1);
        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            if let LoadEvent::Finished(outcome) = event {
                assert!(outcome.is_success());
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_reset_zeroes_progress() {
        let (service, files) = service(vec![("/Game/info.json", b"{}".to_vec())]);
        let mut engine = MemoryEngine::new();
        service
            .load_synchronously(&files, &mut engine, Category::Meta.flag())
            .unwrap();
        assert_eq!(service.percent(), 100);

        service.reset();
        assert_eq!(service.progress(), 0.0);
        assert_eq!(service.message(), None);
    }
}
