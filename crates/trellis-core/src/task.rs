//! Timers and Threads
//!
//! Timers are polled once per frame on the UI thread. Threads run user code
//! on real OS threads and talk to the UI thread only through a pair of
//! channels; write-backs are replayed on the UI thread when the host drains
//! them.
//!
//! Time and thread creation are injected (`Clock`, `ThreadSpawner`) so the
//! core has no hard dependency on the OS and tests can run on a manual clock.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::callbacks::{CallbackInfo, Update};
use crate::id_tree::NodeId;
use crate::refany::RefAny;

static NEXT_TIMER_ID: AtomicUsize = AtomicUsize::new(1);
static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(usize);

impl TimerId {
    pub fn unique() -> Self {
        Self(NEXT_TIMER_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(usize);

impl ThreadId {
    pub fn unique() -> Self {
        Self(NEXT_THREAD_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread:{}", self.0)
    }
}

// ============================================================================
// Injected capabilities
// ============================================================================

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset: Mutex::new(Duration::ZERO) }
    }

    /// The instant the clock started at
    pub fn start(&self) -> Instant {
        self.base
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }

    pub fn set_elapsed(&self, elapsed: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) = elapsed;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

/// Handle to a spawned thread
pub trait ThreadHandle: Send {
    fn is_finished(&self) -> bool;
    /// Wait for the thread; `Err` if it panicked
    fn join(self: Box<Self>) -> Result<(), ThreadError>;
}

/// Creates OS threads
pub trait ThreadSpawner: Send + Sync {
    fn spawn(&self, name: String, f: Box<dyn FnOnce() + Send + 'static>) -> Result<Box<dyn ThreadHandle>, ThreadError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdThreadSpawner;

struct StdThreadHandle(JoinHandle<()>);

impl ThreadHandle for StdThreadHandle {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    fn join(self: Box<Self>) -> Result<(), ThreadError> {
        self.0.join().map_err(|_| ThreadError::Panicked)
    }
}

impl ThreadSpawner for StdThreadSpawner {
    fn spawn(&self, name: String, f: Box<dyn FnOnce() + Send + 'static>) -> Result<Box<dyn ThreadHandle>, ThreadError> {
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(f)
            .map_err(|e| ThreadError::Spawn(e.to_string()))?;
        Ok(Box::new(StdThreadHandle(handle)))
    }
}

/// Capabilities handed to the core by the host
#[derive(Clone)]
pub struct SystemCallbacks {
    pub clock: Arc<dyn Clock>,
    pub spawner: Arc<dyn ThreadSpawner>,
}

impl Default for SystemCallbacks {
    fn default() -> Self {
        Self { clock: Arc::new(SystemClock), spawner: Arc::new(StdThreadSpawner) }
    }
}

impl SystemCallbacks {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..Default::default() }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }
}

impl fmt::Debug for SystemCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemCallbacks").finish_non_exhaustive()
    }
}

// ============================================================================
// Timers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateTimer {
    Terminate,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCallbackReturn {
    pub should_update: Update,
    pub should_terminate: TerminateTimer,
}

impl TimerCallbackReturn {
    pub fn continue_unchanged() -> Self {
        Self { should_update: Update::DoNothing, should_terminate: TerminateTimer::Continue }
    }

    pub fn terminate_unchanged() -> Self {
        Self { should_update: Update::DoNothing, should_terminate: TerminateTimer::Terminate }
    }
}

pub type TimerCallbackType = fn(&mut RefAny, &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn;

/// `CallbackInfo` plus timer bookkeeping
pub struct TimerCallbackInfo<'a> {
    pub callback_info: CallbackInfo<'a>,
    pub node_id: Option<NodeId>,
    pub frame_start: Instant,
    /// Runs before this one
    pub call_count: usize,
    /// The timeout expires before the next run
    pub is_about_to_finish: bool,
}

impl<'a> Deref for TimerCallbackInfo<'a> {
    type Target = CallbackInfo<'a>;

    fn deref(&self) -> &Self::Target {
        &self.callback_info
    }
}

impl DerefMut for TimerCallbackInfo<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.callback_info
    }
}

/// A polled timer.
///
/// The first run happens `delay + interval` after creation, then every
/// `interval`. Without an interval the timer runs every frame.
#[derive(Clone)]
pub struct Timer {
    pub data: RefAny,
    pub node_id: Option<NodeId>,
    pub created: Instant,
    pub last_run: Option<Instant>,
    pub run_count: usize,
    pub delay: Option<Duration>,
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub callback: TimerCallbackType,
}

impl Timer {
    pub fn new(data: RefAny, callback: TimerCallbackType, created: Instant) -> Self {
        Self {
            data,
            node_id: None,
            created,
            last_run: None,
            run_count: 0,
            delay: None,
            interval: None,
            timeout: None,
            callback,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tie the timer to a node; it is stopped when that node's DOM is replaced
    pub fn attach_to(mut self, node: NodeId) -> Self {
        self.node_id = Some(node);
        self
    }

    pub fn instant_of_next_run(&self) -> Instant {
        let last = self.last_run.unwrap_or(self.created + self.delay.unwrap_or_default());
        last + self.interval.unwrap_or_default()
    }

    pub fn should_run(&self, now: Instant) -> bool {
        now >= self.instant_of_next_run()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.timeout.is_some_and(|t| now >= self.created + t)
    }

    /// The run after this one would fall past the timeout
    pub fn is_about_to_finish(&self, now: Instant) -> bool {
        self.timeout
            .is_some_and(|t| now + self.interval.unwrap_or_default() >= self.created + t)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("data", &self.data)
            .field("node_id", &self.node_id)
            .field("run_count", &self.run_count)
            .field("delay", &self.delay)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Threads
// ============================================================================

/// Thread errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThreadError {
    #[error("Failed to spawn thread: {0}")]
    Spawn(String),

    #[error("Thread channel closed")]
    ChannelClosed,

    #[error("Thread panicked")]
    Panicked,
}

/// UI thread to worker
#[derive(Debug, Clone)]
pub enum ThreadSendMsg {
    TerminateThread,
    Tick,
    Custom(RefAny),
}

pub type WriteBackCallbackType = fn(&mut RefAny, &mut RefAny, &mut CallbackInfo<'_>) -> Update;

/// Data plus a callback to run with it on the UI thread.
///
/// The callback receives the thread's write-back data, then `data`.
#[derive(Debug, Clone)]
pub struct ThreadWriteBackMsg {
    pub data: RefAny,
    pub callback: WriteBackCallbackType,
}

impl ThreadWriteBackMsg {
    pub fn new(data: RefAny, callback: WriteBackCallbackType) -> Self {
        Self { data, callback }
    }
}

/// Worker to UI thread
#[derive(Debug, Clone)]
pub enum ThreadReceiveMsg {
    WriteBack(ThreadWriteBackMsg),
    Update(Update),
}

/// Worker-side sender
#[derive(Debug, Clone)]
pub struct ThreadSender {
    inner: Sender<ThreadReceiveMsg>,
}

impl ThreadSender {
    /// `false` once the UI side dropped the thread
    pub fn send(&self, msg: ThreadReceiveMsg) -> bool {
        self.inner.send(msg).is_ok()
    }
}

/// Worker-side receiver
#[derive(Debug)]
pub struct ThreadReceiver {
    inner: Receiver<ThreadSendMsg>,
}

impl ThreadReceiver {
    /// Non-blocking; `None` when nothing is queued or the UI side is gone
    pub fn recv(&self) -> Option<ThreadSendMsg> {
        self.inner.try_recv().ok()
    }

    /// Blocks until a message arrives or the UI side is gone
    pub fn recv_blocking(&self) -> Option<ThreadSendMsg> {
        self.inner.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ThreadSendMsg> {
        self.inner.recv_timeout(timeout).ok()
    }
}

pub type ThreadCallbackType = fn(RefAny, ThreadSender, ThreadReceiver);

/// UI-side half of a running worker
pub struct Thread {
    pub id: ThreadId,
    /// Lives on the UI thread; handed to every write-back callback
    pub writeback_data: RefAny,
    sender: Sender<ThreadSendMsg>,
    receiver: Receiver<ThreadReceiveMsg>,
    handle: Option<Box<dyn ThreadHandle>>,
}

impl Thread {
    /// Start `callback(init_data, ..)` on a new thread
    pub fn spawn(
        spawner: &dyn ThreadSpawner,
        init_data: RefAny,
        writeback_data: RefAny,
        callback: ThreadCallbackType,
    ) -> Result<Self, ThreadError> {
        let id = ThreadId::unique();
        let (to_worker, worker_rx) = mpsc::channel();
        let (worker_tx, from_worker) = mpsc::channel();
        let sender = ThreadSender { inner: worker_tx };
        let receiver = ThreadReceiver { inner: worker_rx };

        let handle = spawner.spawn(format!("trellis-{}", id), Box::new(move || callback(init_data, sender, receiver)))?;
        debug!(thread = %id, "thread spawned");

        Ok(Self { id, writeback_data, sender: to_worker, receiver: from_worker, handle: Some(handle) })
    }

    /// `false` if the worker has gone away
    pub fn send(&self, msg: ThreadSendMsg) -> bool {
        self.sender.send(msg).is_ok()
    }

    /// Up to `max` queued messages in FIFO order
    pub fn drain(&self, max: usize) -> Vec<ThreadReceiveMsg> {
        let mut messages = Vec::new();
        while messages.len() < max {
            match self.receiver.try_recv() {
                Ok(msg) => messages.push(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Join the worker; only blocks if it is still running
    pub fn join(&mut self) -> Result<(), ThreadError> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("writeback_data", &self.writeback_data)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            if !self.send(ThreadSendMsg::TerminateThread) {
                warn!(thread = %self.id, "worker channel closed before termination");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_timer(_: &mut RefAny, _: &mut TimerCallbackInfo<'_>) -> TimerCallbackReturn {
        TimerCallbackReturn::continue_unchanged()
    }

    #[test]
    fn test_timer_schedule() {
        let clock = ManualClock::new();
        let start = clock.now();
        let timer = Timer::new(RefAny::new(()), noop_timer, start).with_interval(Duration::from_millis(16));

        assert!(!timer.should_run(start));
        assert!(!timer.should_run(start + Duration::from_millis(15)));
        assert!(timer.should_run(start + Duration::from_millis(16)));

        let mut timer = timer;
        timer.last_run = Some(start + Duration::from_millis(16));
        assert_eq!(timer.instant_of_next_run(), start + Duration::from_millis(32));
    }

    #[test]
    fn test_timer_delay_and_timeout() {
        let start = Instant::now();
        let timer = Timer::new(RefAny::new(()), noop_timer, start)
            .with_delay(Duration::from_millis(100))
            .with_timeout(Duration::from_millis(150));
        assert!(!timer.should_run(start + Duration::from_millis(50)));
        assert!(timer.should_run(start + Duration::from_millis(100)));
        assert!(!timer.is_expired(start + Duration::from_millis(149)));
        assert!(timer.is_expired(start + Duration::from_millis(150)));
    }

    #[test]
    fn test_about_to_finish() {
        let start = Instant::now();
        let timer = Timer::new(RefAny::new(()), noop_timer, start)
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(30));
        assert!(!timer.is_about_to_finish(start + Duration::from_millis(10)));
        assert!(timer.is_about_to_finish(start + Duration::from_millis(20)));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(16));
        assert_eq!(clock.now() - t0, Duration::from_millis(16));
        clock.set_elapsed(Duration::from_millis(5));
        assert_eq!(clock.elapsed(), Duration::from_millis(5));
    }

    fn echo_worker(init: RefAny, sender: ThreadSender, receiver: ThreadReceiver) {
        let value = init.get_cloned::<u32>().unwrap_or_default();
        sender.send(ThreadReceiveMsg::Update(Update::RefreshDom));
        while let Some(msg) = receiver.recv_blocking() {
            match msg {
                ThreadSendMsg::TerminateThread => break,
                ThreadSendMsg::Tick => {}
                ThreadSendMsg::Custom(_) => {
                    sender.send(ThreadReceiveMsg::WriteBack(ThreadWriteBackMsg::new(RefAny::new(value), noop_writeback)));
                }
            }
        }
    }

    fn noop_writeback(_: &mut RefAny, _: &mut RefAny, _: &mut CallbackInfo<'_>) -> Update {
        Update::DoNothing
    }

    #[test]
    fn test_thread_round_trip() {
        let mut thread = Thread::spawn(&StdThreadSpawner, RefAny::new(7u32), RefAny::new(()), echo_worker).unwrap();
        assert!(thread.send(ThreadSendMsg::Custom(RefAny::new(()))));
        assert!(thread.send(ThreadSendMsg::TerminateThread));
        thread.join().unwrap();

        let messages = thread.drain(10);
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ThreadReceiveMsg::Update(Update::RefreshDom)));
        match &messages[1] {
            ThreadReceiveMsg::WriteBack(wb) => assert_eq!(wb.data.get_cloned::<u32>(), Some(7)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(thread.is_finished());
    }

    #[test]
    fn test_drain_respects_limit() {
        fn burst(_: RefAny, sender: ThreadSender, _: ThreadReceiver) {
            for _ in 0..5 {
                sender.send(ThreadReceiveMsg::Update(Update::DoNothing));
            }
        }
        let mut thread = Thread::spawn(&StdThreadSpawner, RefAny::new(()), RefAny::new(()), burst).unwrap();
        thread.join().unwrap();
        assert_eq!(thread.drain(3).len(), 3);
        assert_eq!(thread.drain(3).len(), 2);
    }
}
