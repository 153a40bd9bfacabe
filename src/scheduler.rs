//! The active-object layer: schedulers, servants and their dispatch
//! helpers.
//!
//! A [`Scheduler`] owns one worker thread draining a FIFO task channel. A
//! [`Servant`] binds a piece of state to exactly one scheduler; all
//! mutation happens in tasks on that thread, so servants never share
//! mutable state. Cross-servant calls go through [`Servant::post`]
//! (fire-and-forget), [`Servant::post_future`] (blocking reply) or
//! [`Servant::post_callback`] (reply routed through the caller's scheduler,
//! dropped if the caller is gone).

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Task(Task),
    Shutdown,
}

const QUEUE_CAPACITY: usize = 256;

/// A worker thread with a FIFO task queue. Tasks posted from one thread
/// run in posting order; destruction drains the queue before joining.
pub struct Scheduler {
    sender: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(name: &str) -> Arc<Scheduler> {
        let (sender, receiver) = bounded::<Message>(QUEUE_CAPACITY);
        let thread_name = name.to_owned();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!("scheduler '{}' up", thread_name);
                Scheduler::run(&receiver);
                debug!("scheduler '{}' down", thread_name);
            })
            .expect("failed to spawn scheduler thread");
        Arc::new(Scheduler {
            sender,
            handle: Some(handle),
        })
    }

    fn run(receiver: &Receiver<Message>) {
        while let Ok(message) = receiver.recv() {
            match message {
                Message::Task(task) => task(),
                Message::Shutdown => break,
            }
        }
    }

    /// Enqueues a task. Blocks briefly if the queue is full.
    pub fn push(&self, task: Task) {
        // A send error means the worker is gone; the task is dropped, which
        // only happens during teardown.
        let _ = self.sender.send(Message::Task(task));
    }

    pub fn thread_id(&self) -> ThreadId {
        self.handle
            .as_ref()
            .expect("scheduler thread handle taken")
            .thread()
            .id()
    }

    /// True when called from this scheduler's own worker thread.
    pub fn runs_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Error of a future whose servant disappeared (or panicked) before
/// answering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FutureDropped;

impl std::fmt::Display for FutureDropped {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("the servant was destroyed before the future resolved")
    }
}

impl std::error::Error for FutureDropped {}

/// Completion receiver for a posted task's return value.
pub struct Future<T> {
    receiver: Receiver<T>,
}

impl<T> Future<T> {
    /// Blocks until the value arrives.
    pub fn get(self) -> Result<T, FutureDropped> {
        self.receiver.recv().map_err(|_| FutureDropped)
    }

    /// Blocks at most `timeout`.
    pub fn get_timeout(self, timeout: Duration) -> Result<T, FutureDropped> {
        self.receiver.recv_timeout(timeout).map_err(|_| FutureDropped)
    }
}

/// State bound to one scheduler. Cloning the servant clones the handle,
/// not the state.
pub struct Servant<S> {
    state: Arc<Mutex<S>>,
    scheduler: Arc<Scheduler>,
}

impl<S> Clone for Servant<S> {
    fn clone(&self) -> Servant<S> {
        Servant {
            state: Arc::clone(&self.state),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<S: Send + 'static> Servant<S> {
    pub fn new(scheduler: Arc<Scheduler>, state: S) -> Servant<S> {
        Servant {
            state: Arc::new(Mutex::new(state)),
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Fire-and-forget dispatch.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.scheduler.push(Box::new(move || {
            let mut state = state.lock().expect("servant state poisoned");
            f(&mut state);
        }));
    }

    /// Dispatch returning a future for the task's result.
    pub fn future<R, F>(&self, f: F) -> Future<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let state = Arc::clone(&self.state);
        self.scheduler.push(Box::new(move || {
            let result = {
                let mut state = state.lock().expect("servant state poisoned");
                f(&mut state)
            };
            let _ = sender.send(result);
        }));
        Future { receiver }
    }

    /// Blocking dispatch. When called from the servant's own thread the
    /// task runs inline, since waiting on the queue there would deadlock.
    pub fn post_future<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        if self.scheduler.runs_current_thread() {
            let mut state = self.state.lock().expect("servant state poisoned");
            return f(&mut state);
        }
        self.future(f)
            .get()
            .expect("servant destroyed during post_future")
    }

    /// Safe callback: computes on this servant's thread, then delivers the
    /// result on the caller's scheduler, dropping it silently when the
    /// caller's scheduler no longer exists.
    pub fn post_callback<R, F, C>(&self, f: F, caller: &Arc<Scheduler>, callback: C)
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
        C: FnOnce(R) + Send + 'static,
    {
        let weak_caller: Weak<Scheduler> = Arc::downgrade(caller);
        let state = Arc::clone(&self.state);
        self.scheduler.push(Box::new(move || {
            let result = {
                let mut state = state.lock().expect("servant state poisoned");
                f(&mut state)
            };
            if let Some(caller) = weak_caller.upgrade() {
                caller.push(Box::new(move || callback(result)));
            }
        }));
    }
}

/// Shared flag + condition variable used to cancel long-running execution.
///
/// `wait_for` is the only blocking primitive the execution loop uses; it
/// returns early (with `true`) as soon as the flag is raised.
#[derive(Clone)]
pub struct StopCondition {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopCondition {
    pub fn new() -> StopCondition {
        StopCondition {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn raise(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().expect("stop condition poisoned") = true;
        condvar.notify_all();
    }

    pub fn reset(&self) {
        let (flag, _) = &*self.inner;
        *flag.lock().expect("stop condition poisoned") = false;
    }

    pub fn is_raised(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().expect("stop condition poisoned")
    }

    /// Sleeps up to `duration`; returns `true` when woken by `raise`.
    pub fn wait_for(&self, duration: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let mut raised = flag.lock().expect("stop condition poisoned");
        let deadline = std::time::Instant::now() + duration;
        while !*raised {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _timeout) = condvar
                .wait_timeout(raised, deadline - now)
                .expect("stop condition poisoned");
            raised = guard;
        }
        true
    }
}

impl Default for StopCondition {
    fn default() -> StopCondition {
        StopCondition::new()
    }
}

/// Couples the executor to its observer: the executor parks after posting
/// an update until the observer acknowledges with `notify` (the project's
/// `gui_ready`). The wait also ends when the attached stop condition is
/// raised, so cancellation is never blocked on a stalled observer.
#[derive(Clone)]
pub struct SyncCondition {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl SyncCondition {
    pub fn new() -> SyncCondition {
        SyncCondition {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Acknowledges the pending update.
    pub fn notify(&self) {
        let (acknowledged, condvar) = &*self.inner;
        *acknowledged.lock().expect("sync condition poisoned") = true;
        condvar.notify_all();
    }

    /// Waits for the acknowledgement, polling the stop condition so a
    /// raised stop ends the wait promptly.
    pub fn wait(&self, stop: &StopCondition) {
        let (acknowledged, condvar) = &*self.inner;
        let mut guard = acknowledged.lock().expect("sync condition poisoned");
        while !*guard && !stop.is_raised() {
            let (next, _timeout) = condvar
                .wait_timeout(guard, Duration::from_millis(10))
                .expect("sync condition poisoned");
            guard = next;
        }
        *guard = false;
    }
}

impl Default for SyncCondition {
    fn default() -> SyncCondition {
        SyncCondition::new()
    }
}
