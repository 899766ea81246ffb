//! Single render thread bound to a lazily created graphics context
//!
//! Every engine and texture call goes through here. The thread and its
//! context are only created when the first piece of work actually needs
//! them; work scheduled earlier waits in a bounded [`PendingWorkQueue`] and is
//! replayed in submission order before anything else runs.

use crate::context::{ContextFactory, ContextGuard};
use crate::error::RenderError;
use crossbeam::channel::{self, Sender};
use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Unit of work executed on the render thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Work submitted before the render thread exists.
///
/// Bounded FIFO, drained exactly once when the thread starts.
pub struct PendingWorkQueue {
    tasks: ArrayQueue<Job>,
    drained: AtomicBool,
}

impl PendingWorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: ArrayQueue::new(capacity.max(1)),
            drained: AtomicBool::new(false),
        }
    }

    fn push(&self, job: Job) -> Result<(), RenderError> {
        if self.drained.load(Ordering::Acquire) {
            return Err(RenderError::Released);
        }
        self.tasks
            .push(job)
            .map_err(|_| RenderError::PendingQueueFull(self.tasks.capacity()))
    }

    /// Run every queued job in order; later calls are no-ops
    fn drain(&self) -> usize {
        if self.drained.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let mut ran = 0;
        while let Some(job) = self.tasks.pop() {
            run_job(job);
            ran += 1;
        }
        ran
    }

    fn clear(&self) {
        while self.tasks.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

enum WorkerState {
    Idle,
    Running {
        tx: Sender<Message>,
        handle: Option<JoinHandle<()>>,
        thread_id: ThreadId,
    },
    Released,
}

enum Route {
    Inline,
    Send(Sender<Message>),
}

/// Render dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Render thread name
    pub thread_name: String,
    /// Pin the render thread to this CPU core
    pub core: Option<usize>,
    /// Capacity of the pre-start pending queue
    pub pending_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: "beauty-render".to_string(),
            core: None,
            pending_capacity: 64,
        }
    }
}

/// Owns the render thread and serialises work onto it
pub struct RenderDispatcher {
    config: DispatcherConfig,
    factory: Arc<dyn ContextFactory>,
    state: Mutex<WorkerState>,
    pending: Arc<PendingWorkQueue>,
    executed_jobs: Arc<AtomicU64>,
}

impl RenderDispatcher {
    pub fn new(config: DispatcherConfig, factory: Arc<dyn ContextFactory>) -> Self {
        let pending = Arc::new(PendingWorkQueue::new(config.pending_capacity));
        Self {
            config,
            factory,
            state: Mutex::new(WorkerState::Idle),
            pending,
            executed_jobs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the render thread and create its context if not running yet
    pub fn start(&self) -> Result<(), RenderError> {
        self.sender().map(|_| ())
    }

    /// Run `f` on the render thread and wait for its result.
    ///
    /// Runs inline when already on the render thread. Starts the thread if
    /// needed.
    pub fn run_now<R, F>(&self, f: F) -> Result<R, RenderError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let tx = match self.route()? {
            Route::Inline => return Ok(f()),
            Route::Send(tx) => tx,
        };

        let (reply_tx, reply_rx) = channel::bounded(1);
        let job: Job = Box::new(move || {
            let _ = reply_tx.send(f());
        });
        tx.send(Message::Run(job))
            .map_err(|_| RenderError::WorkerGone)?;

        // a dropped reply sender means the job panicked or never ran
        reply_rx.recv().map_err(|_| RenderError::WorkerGone)
    }

    /// Queue `f` on the render thread without waiting. Starts the thread if needed.
    pub fn run_deferred<F>(&self, f: F) -> Result<(), RenderError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender()?
            .send(Message::Run(Box::new(f)))
            .map_err(|_| RenderError::WorkerGone)
    }

    /// Queue `f` for the render thread, or park it until the thread exists.
    ///
    /// Never creates the thread itself.
    pub fn schedule<F>(&self, f: F) -> Result<(), RenderError>
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.state.lock();
        match &*state {
            WorkerState::Idle => self.pending.push(Box::new(f)),
            WorkerState::Running { tx, .. } => tx
                .send(Message::Run(Box::new(f)))
                .map_err(|_| RenderError::WorkerGone),
            WorkerState::Released => Err(RenderError::Released),
        }
    }

    /// Stop the render thread.
    ///
    /// Work already queued runs first, then `teardown`, then the context is
    /// disposed and the thread joined. Later calls fail with
    /// [`RenderError::Released`].
    pub fn release(&self, teardown: Option<Job>) -> Result<(), RenderError> {
        let previous = std::mem::replace(&mut *self.state.lock(), WorkerState::Released);

        match previous {
            WorkerState::Released => Err(RenderError::Released),
            WorkerState::Idle => {
                // context never existed, nothing to tear down
                self.pending.clear();
                Ok(())
            }
            WorkerState::Running {
                tx,
                handle,
                thread_id,
            } => {
                if let Some(job) = teardown {
                    let _ = tx.send(Message::Run(job));
                }
                let _ = tx.send(Message::Shutdown);
                drop(tx);
                join_worker(handle, thread_id);
                Ok(())
            }
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(&*self.state.lock(), WorkerState::Running { .. })
    }

    pub fn is_released(&self) -> bool {
        matches!(&*self.state.lock(), WorkerState::Released)
    }

    /// True when called from the render thread
    pub fn is_render_thread(&self) -> bool {
        match &*self.state.lock() {
            WorkerState::Running { thread_id, .. } => *thread_id == thread::current().id(),
            _ => false,
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            started: self.is_started(),
            executed_jobs: self.executed_jobs.load(Ordering::Relaxed),
            pending_jobs: self.pending.len(),
        }
    }

    /// Inline when called from the render thread, otherwise a sender
    fn route(&self) -> Result<Route, RenderError> {
        let mut state = self.state.lock();
        if let WorkerState::Running { thread_id, .. } = &*state {
            if *thread_id == thread::current().id() {
                return Ok(Route::Inline);
            }
        }
        self.sender_locked(&mut state).map(Route::Send)
    }

    fn sender(&self) -> Result<Sender<Message>, RenderError> {
        let mut state = self.state.lock();
        self.sender_locked(&mut state)
    }

    fn sender_locked(&self, state: &mut WorkerState) -> Result<Sender<Message>, RenderError> {
        match *state {
            WorkerState::Running { ref tx, .. } => Ok(tx.clone()),
            WorkerState::Released => Err(RenderError::Released),
            WorkerState::Idle => {
                let (tx, handle, thread_id) = self.spawn_worker()?;
                *state = WorkerState::Running {
                    tx: tx.clone(),
                    handle: Some(handle),
                    thread_id,
                };
                Ok(tx)
            }
        }
    }

    /// Spawn the render thread and wait until its context is current
    fn spawn_worker(&self) -> Result<(Sender<Message>, JoinHandle<()>, ThreadId), RenderError> {
        let (tx, rx) = channel::unbounded::<Message>();
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), RenderError>>(1);

        let factory = self.factory.clone();
        let pending = self.pending.clone();
        let executed = self.executed_jobs.clone();
        let core = self.config.core;

        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                if let Some(index) = core {
                    pin_to_core(index);
                }

                let guard = match ContextGuard::acquire(factory.as_ref()) {
                    Ok(guard) => guard,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let replayed = pending.drain();
                executed.fetch_add(replayed as u64, Ordering::Relaxed);
                if replayed > 0 {
                    log::debug!("render thread replayed {} pending tasks", replayed);
                }

                while let Ok(message) = rx.recv() {
                    match message {
                        Message::Run(job) => {
                            run_job(job);
                            executed.fetch_add(1, Ordering::Relaxed);
                        }
                        Message::Shutdown => break,
                    }
                }

                drop(guard);
                log::info!("Render thread exiting");
            })?;

        let thread_id = handle.thread().id();
        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("render thread '{}' started", self.config.thread_name);
                Ok((tx, handle, thread_id))
            }
            Ok(Err(e)) => {
                handle.join().ok();
                log::error!("render thread failed to start: {}", e);
                Err(e)
            }
            Err(_) => {
                handle.join().ok();
                Err(RenderError::WorkerGone)
            }
        }
    }
}

impl Drop for RenderDispatcher {
    fn drop(&mut self) {
        let previous = std::mem::replace(&mut *self.state.lock(), WorkerState::Released);
        if let WorkerState::Running {
            tx,
            handle,
            thread_id,
        } = previous
        {
            let _ = tx.send(Message::Shutdown);
            drop(tx);
            join_worker(handle, thread_id);
        }
    }
}

/// Run one job; a panicking job is logged and the thread keeps serving
fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        log::error!("render job panicked, continuing");
    }
}

fn join_worker(handle: Option<JoinHandle<()>>, thread_id: ThreadId) {
    // the render thread cannot join itself; it exits once it reads Shutdown
    if thread::current().id() == thread_id {
        return;
    }
    if let Some(handle) = handle {
        handle.join().ok();
    }
}

fn pin_to_core(index: usize) {
    let core = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|core| core.id == index));
    match core {
        Some(core) if core_affinity::set_for_current(core) => {
            log::debug!("render thread pinned to core {}", index);
        }
        _ => log::warn!("could not pin render thread to core {}", index),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherStats {
    pub started: bool,
    pub executed_jobs: u64,
    pub pending_jobs: usize,
}
