//! Idle sign-out watchdog.
//!
//! Two states: `Idle` (no user, or already expired) and `Active` (a single
//! timer is armed). Activity while active cancels the pending timer and arms a
//! fresh one with the full window; expiry fires the sign-out callback once.

#[cfg(not(target_arch = "wasm32"))]
use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// User input that counts as "still here".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivityEvent {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
}

impl ActivityEvent {
    pub const ALL: [ActivityEvent; 5] = [
        ActivityEvent::PointerDown,
        ActivityEvent::PointerMove,
        ActivityEvent::KeyDown,
        ActivityEvent::Scroll,
        ActivityEvent::TouchStart,
    ];

    /// DOM event type to listen for.
    pub fn dom_event(self) -> &'static str {
        match self {
            ActivityEvent::PointerDown => "mousedown",
            ActivityEvent::PointerMove => "mousemove",
            ActivityEvent::KeyDown => "keydown",
            ActivityEvent::Scroll => "scroll",
            ActivityEvent::TouchStart => "touchstart",
        }
    }
}

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// One-shot timers.
pub trait Timer: Send + Sync {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancelling an unknown or already-fired handle is a no-op.
    fn cancel(&self, handle: TimerHandle);
}

#[inline]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tokio-backed timer. `schedule` must be called from inside a runtime.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct TokioTimer {
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<u64, tokio::task::JoinHandle<()>>>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::downgrade(&self.tasks);
        // Hold the map lock across spawn so the task cannot remove itself before insertion.
        let mut guard = lock(&self.tasks);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tasks) = tasks.upgrade() {
                lock(&tasks).remove(&id);
            }
            callback();
        });
        guard.insert(id, task);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = lock(&self.tasks).remove(&handle.0) {
            task.abort();
        }
    }
}

/// Manually driven clock for tests and headless hosts.
#[derive(Default)]
pub struct ManualTimer {
    inner: Mutex<ManualInner>,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_id: u64,
    pending: Vec<(u64, Duration, TimerCallback)>,
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ManualTimer")
            .field("now", &inner.now)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    pub fn pending(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Moves the clock forward, firing every timer that comes due, earliest first.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.inner).now + by;
        loop {
            let due = {
                let mut inner = lock(&self.inner);
                let next = inner
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, at, _))| *at <= target)
                    .min_by_key(|(_, (id, at, _))| (*at, *id))
                    .map(|(idx, _)| idx);
                match next {
                    Some(idx) => {
                        let (_, at, cb) = inner.pending.remove(idx);
                        inner.now = inner.now.max(at);
                        Some(cb)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };
            // Callbacks run unlocked; they may schedule or cancel.
            match due {
                Some(cb) => cb(),
                None => break,
            }
        }
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        let at = inner.now + delay;
        inner.pending.push((id, at, callback));
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        lock(&self.inner).pending.retain(|(id, _, _)| *id != handle.0);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Active { handle: TimerHandle, generation: u64 },
}

struct Shared {
    state: WatchState,
    generation: u64,
}

pub type ExpireCallback = Arc<dyn Fn() + Send + Sync>;

pub struct Watchdog {
    shared: Arc<Mutex<Shared>>,
    timer: Arc<dyn Timer>,
    window: Duration,
    on_expire: ExpireCallback,
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("state", &self.state())
            .field("window", &self.window)
            .finish()
    }
}

impl Watchdog {
    pub fn new(timer: Arc<dyn Timer>, window: Duration, on_expire: ExpireCallback) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: WatchState::Idle,
                generation: 0,
            })),
            timer,
            window,
            on_expire,
        }
    }

    pub fn state(&self) -> WatchState {
        lock(&self.shared).state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state(), WatchState::Active { .. })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed a user transition: signed in arms (or re-arms), signed out disarms.
    pub fn user_changed(&self, signed_in: bool) {
        if signed_in {
            self.arm();
        } else {
            self.disarm();
        }
    }

    /// Activity only matters while armed; it pushes the deadline out by a full window.
    ///
    /// The armed check and the re-arm share one lock, so an expiry cannot slip
    /// in between and be undone.
    pub fn activity(&self, event: ActivityEvent) {
        let mut shared = lock(&self.shared);
        if matches!(shared.state, WatchState::Active { .. }) {
            log::trace!("[watchdog] activity {event:?}, re-arming");
            self.arm_locked(&mut shared);
        }
    }

    pub fn disarm(&self) {
        let mut shared = lock(&self.shared);
        if let WatchState::Active { handle, .. } = shared.state {
            self.timer.cancel(handle);
            log::debug!("[watchdog] disarmed");
        }
        shared.state = WatchState::Idle;
    }

    fn arm(&self) {
        let mut shared = lock(&self.shared);
        self.arm_locked(&mut shared);
    }

    fn arm_locked(&self, shared: &mut Shared) {
        if let WatchState::Active { handle, .. } = shared.state {
            self.timer.cancel(handle);
        }
        shared.generation += 1;
        let generation = shared.generation;

        let weak: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);
        let on_expire = Arc::clone(&self.on_expire);
        let window = self.window;
        let handle = self.timer.schedule(
            self.window,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                {
                    let mut shared = lock(&shared);
                    match shared.state {
                        WatchState::Active { generation: g, .. } if g == generation => {
                            shared.state = WatchState::Idle;
                        }
                        // Superseded by a later arm or a disarm.
                        _ => return,
                    }
                }
                log::info!("[watchdog] idle for {}s, signing out", window.as_secs());
                on_expire();
            }),
        );
        shared.state = WatchState::Active { handle, generation };
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn watchdog(timer: Arc<ManualTimer>) -> (Watchdog, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let dog = Watchdog::new(
            timer,
            DEFAULT_IDLE_WINDOW,
            Arc::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (dog, fired)
    }

    #[test]
    fn idle_without_user_ignores_activity() {
        let timer = Arc::new(ManualTimer::new());
        let (dog, fired) = watchdog(timer.clone());
        dog.activity(ActivityEvent::KeyDown);
        assert_eq!(dog.state(), WatchState::Idle);
        assert_eq!(timer.pending(), 0);
        timer.advance(DEFAULT_IDLE_WINDOW * 2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn activity_keeps_session_alive() {
        let timer = Arc::new(ManualTimer::new());
        let (dog, fired) = watchdog(timer.clone());
        dog.user_changed(true);
        for event in ActivityEvent::ALL.iter().cycle().take(20) {
            timer.advance(Duration::from_secs(50 * 60));
            dog.activity(*event);
            assert_eq!(timer.pending(), 1);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(dog.is_armed());
    }

    #[test]
    fn long_gap_signs_out_exactly_once() {
        let timer = Arc::new(ManualTimer::new());
        let (dog, fired) = watchdog(timer.clone());
        dog.user_changed(true);
        timer.advance(DEFAULT_IDLE_WINDOW);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(dog.state(), WatchState::Idle);

        // Activity after expiry does not re-arm.
        dog.activity(ActivityEvent::PointerMove);
        timer.advance(DEFAULT_IDLE_WINDOW * 3);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sign_out_cancels_timer() {
        let timer = Arc::new(ManualTimer::new());
        let (dog, fired) = watchdog(timer.clone());
        dog.user_changed(true);
        dog.user_changed(false);
        assert_eq!(timer.pending(), 0);
        timer.advance(DEFAULT_IDLE_WINDOW);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_cancels_timer() {
        let timer = Arc::new(ManualTimer::new());
        let (dog, fired) = watchdog(timer.clone());
        dog.user_changed(true);
        drop(dog);
        assert_eq!(timer.pending(), 0);
        timer.advance(DEFAULT_IDLE_WINDOW);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn expiry_racing_activity_is_never_rearmed() {
        for _ in 0..200 {
            let timer = Arc::new(ManualTimer::new());
            let (dog, fired) = watchdog(timer.clone());
            dog.user_changed(true);
            std::thread::scope(|s| {
                s.spawn(|| {
                    for event in ActivityEvent::ALL.iter().cycle().take(50) {
                        dog.activity(*event);
                    }
                });
                s.spawn(|| timer.advance(DEFAULT_IDLE_WINDOW));
            });
            match fired.load(Ordering::SeqCst) {
                0 => assert!(dog.is_armed()),
                1 => {
                    assert_eq!(dog.state(), WatchState::Idle);
                    assert_eq!(timer.pending(), 0);
                }
                n => panic!("fired {n} times"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timer_fires_after_window() {
        let timer = Arc::new(TokioTimer::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let dog = Watchdog::new(
            timer.clone(),
            Duration::from_secs(10),
            Arc::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        dog.user_changed(true);
        tokio::time::sleep(Duration::from_secs(9)).await;
        dog.activity(ActivityEvent::Scroll);
        assert_eq!(timer.pending(), 1);
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!dog.is_armed());
    }
}
