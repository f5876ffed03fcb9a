#![forbid(unsafe_code)]

//! Virtual-clock timer queue.
//!
//! [`Timers`] is the host's only notion of time. Nothing sleeps: callers arm
//! a timer and return, and the owner of the loop moves the clock forward with
//! [`advance`](Timers::advance), which runs every timer that falls due.
//!
//! # Invariants
//!
//! 1. Timers fire in deadline order; equal deadlines fire in arming order.
//! 2. `now()` equals the deadline of the timer being run while it runs, and
//!    the advance target once `advance` returns.
//! 3. A cleared timer never fires again, including when it is cleared from
//!    inside its own callback.
//! 4. No borrow of the queue is held while a callback runs, so callbacks may
//!    arm and clear timers freely.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

/// Identifier of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Smallest period a repeating timer may have.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

type Callback = Box<dyn FnMut()>;

struct Slot {
    /// `None` while the callback is running.
    callback: Option<Callback>,
    period: Option<Duration>,
    key: (Duration, u64),
}

#[derive(Default)]
struct TimersInner {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), TimerId>,
    slots: HashMap<TimerId, Slot>,
}

impl TimersInner {
    fn schedule(&mut self, id: TimerId, deadline: Duration) -> (Duration, u64) {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(key, id);
        key
    }
}

/// Shared handle to the timer queue. Clones refer to the same clock.
#[derive(Clone, Default)]
pub struct Timers {
    inner: Rc<RefCell<TimersInner>>,
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Timers")
            .field("now", &inner.now)
            .field("pending", &inner.slots.len())
            .finish()
    }
}

impl Timers {
    /// A clock at zero with nothing armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since the clock was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Run `callback` once, `delay` from now.
    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let mut once = Some(callback);
        self.arm(
            delay,
            None,
            Box::new(move || {
                if let Some(cb) = once.take() {
                    cb();
                }
            }),
        )
    }

    /// Run `callback` every `period`, first at `now + period`.
    ///
    /// Periods shorter than [`MIN_PERIOD`] are raised to it.
    pub fn set_interval(&self, period: Duration, callback: impl FnMut() + 'static) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.arm(period, Some(period), Box::new(callback))
    }

    fn arm(&self, delay: Duration, period: Option<Duration>, callback: Callback) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = TimerId(inner.next_id);
        inner.next_id += 1;
        let deadline = inner.now + delay;
        let key = inner.schedule(id, deadline);
        inner.slots.insert(
            id,
            Slot {
                callback: Some(callback),
                period,
                key,
            },
        );
        trace!(target: "tether::timer", id = id.0, ?deadline, repeating = period.is_some(), "armed");
        id
    }

    /// Cancel a timer. Returns `false` if it already fired or was cleared.
    pub fn clear(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.slots.remove(&id) {
            Some(slot) => {
                inner.queue.remove(&slot.key);
                trace!(target: "tether::timer", id = id.0, "cleared");
                true
            }
            None => false,
        }
    }

    /// Whether `id` is still armed.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.borrow().slots.contains_key(&id)
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    /// Deadline of the next timer to fire.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.borrow().queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Move the clock forward by `by`, running every timer due on the way.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        self.advance_to(target)
    }

    /// Move the clock to `target` (never backwards), running due timers.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        while self.fire_next(Some(target)) {
            fired += 1;
        }
        let mut inner = self.inner.borrow_mut();
        if target > inner.now {
            inner.now = target;
        }
        fired
    }

    /// Run timers in deadline order until none remain or `max_steps` ran.
    pub fn run_until_idle(&self, max_steps: usize) -> usize {
        let mut fired = 0;
        while fired < max_steps && self.fire_next(None) {
            fired += 1;
        }
        fired
    }

    /// Fire the earliest timer due at or before `limit`.
    fn fire_next(&self, limit: Option<Duration>) -> bool {
        let (id, mut callback) = {
            let mut inner = self.inner.borrow_mut();
            let Some((&key, &id)) = inner.queue.iter().next() else {
                return false;
            };
            if limit.is_some_and(|limit| key.0 > limit) {
                return false;
            }
            inner.queue.remove(&key);
            if key.0 > inner.now {
                inner.now = key.0;
            }
            let Some(callback) = inner.slots.get_mut(&id).and_then(|s| s.callback.take()) else {
                return true;
            };
            (id, callback)
        };

        callback();

        let mut inner = self.inner.borrow_mut();
        let now = inner.now;
        let period = match inner.slots.get(&id) {
            Some(slot) => slot.period,
            None => return true,
        };
        match period {
            Some(period) => {
                let key = inner.schedule(id, now + period);
                if let Some(slot) = inner.slots.get_mut(&id) {
                    slot.callback = Some(callback);
                    slot.key = key;
                }
            }
            None => {
                inner.slots.remove(&id);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn timeout_fires_once_at_deadline() {
        let timers = Timers::new();
        let at = Rc::new(Cell::new(None));
        let a = Rc::clone(&at);
        let t = timers.clone();
        timers.set_timeout(ms(300), move || a.set(Some(t.now())));

        assert_eq!(timers.advance(ms(299)), 0);
        assert_eq!(at.get(), None);
        assert_eq!(timers.advance(ms(1)), 1);
        assert_eq!(at.get(), Some(ms(300)));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn interval_repeats() {
        let timers = Timers::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = timers.set_interval(ms(1000), move || c.set(c.get() + 1));

        timers.advance(ms(3500));
        assert_eq!(count.get(), 3);
        assert!(timers.is_pending(id));
        assert_eq!(timers.next_deadline(), Some(ms(4000)));
        assert!(timers.clear(id));
        timers.advance(ms(5000));
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn equal_deadlines_fire_in_arming_order() {
        let timers = Timers::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let l = Rc::clone(&log);
            timers.set_timeout(ms(10), move || l.borrow_mut().push(name));
        }
        timers.advance(ms(10));
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn clear_from_own_callback() {
        let timers = Timers::new();
        let count = Rc::new(Cell::new(0));
        let id_slot = Rc::new(Cell::new(None));
        let (c, slot, t) = (Rc::clone(&count), Rc::clone(&id_slot), timers.clone());
        let id = timers.set_interval(ms(5), move || {
            c.set(c.get() + 1);
            if let Some(id) = slot.get() {
                t.clear(id);
            }
        });
        id_slot.set(Some(id));
        timers.advance(ms(100));
        assert_eq!(count.get(), 1);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn callbacks_can_arm_timers() {
        let timers = Timers::new();
        let fired = Rc::new(Cell::new(false));
        let (f, t) = (Rc::clone(&fired), timers.clone());
        timers.set_timeout(ms(10), move || {
            let f = Rc::clone(&f);
            t.set_timeout(ms(10), move || f.set(true));
        });
        timers.advance(ms(15));
        assert!(!fired.get());
        timers.advance(ms(5));
        assert!(fired.get());
    }

    #[test]
    fn clear_unknown_is_false() {
        let timers = Timers::new();
        let id = timers.set_timeout(ms(1), || {});
        timers.advance(ms(1));
        assert!(!timers.clear(id));
    }

    #[test]
    fn run_until_idle_is_bounded() {
        let timers = Timers::new();
        timers.set_interval(Duration::ZERO, || {});
        assert_eq!(timers.run_until_idle(25), 25);
        assert_eq!(timers.now(), ms(25));
    }
}
