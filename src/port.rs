use crate::sync::atomic::{AtomicU64, Ordering};
use crate::sync::{Arc, Mutex};
use std::collections::VecDeque;

/// Simulation clock.
///
/// Shared monotonic cycle counter. Every port captures a handle so a push
/// can compute its delivery cycle without threading the current cycle
/// through every call site.
#[derive(Debug, Clone, Default)]
pub struct Clock(Arc<AtomicU64>);

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cycle.
    #[must_use]
    #[inline]
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn advance(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rewind(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Shared handle to a port.
pub type Ref<T> = Arc<Mutex<Port<T>>>;

/// Typed FIFO port with a time-ordered pushback discipline.
///
/// `push(value, delay)` makes `value` observable at the head no earlier
/// than cycle `now + delay`. A zero delay is a wiring bug: a tick must
/// never observe a same-cycle push, so `front`/`pop` only surface entries
/// whose delivery cycle has been reached (the snapshot rule).
///
/// Entries are kept ordered by delivery cycle at insertion time; entries
/// with equal delivery cycles keep their push order.
#[derive(Debug)]
pub struct Port<T> {
    clock: Clock,
    queue: VecDeque<(u64, T)>,
    sink: Option<Ref<T>>,
}

impl<T> Port<T> {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            queue: VecDeque::new(),
            sink: None,
        }
    }

    #[must_use]
    pub fn shared(clock: &Clock) -> Ref<T> {
        Arc::new(Mutex::new(Self::new(clock.clone())))
    }

    /// Short-circuit this port into `sink`.
    ///
    /// Subsequent pushes are delivered directly into `sink` (following its
    /// own binding, if any), still honoring the source-side delay. Binding
    /// a port twice is a wiring bug.
    pub fn bind(&mut self, sink: &Ref<T>) {
        assert!(self.sink.is_none(), "port is already bound");
        self.sink = Some(Arc::clone(sink));
    }

    pub fn push(&mut self, value: T, delay: u64) {
        assert!(delay >= 1, "zero-delay push");
        let cycle = self.clock.now() + delay;
        match &self.sink {
            Some(sink) => deliver(sink, cycle, value),
            None => self.insert(cycle, value),
        }
    }

    fn insert(&mut self, cycle: u64, value: T) {
        let at = self.queue.partition_point(|(ready, _)| *ready <= cycle);
        self.queue.insert(at, (cycle, value));
    }

    /// True when no entry is observable at the current cycle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.front().is_none()
    }

    /// Number of observable entries at the current cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.queue.partition_point(|(ready, _)| *ready <= now)
    }

    /// Number of entries queued, observable or not.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        let (ready, value) = self.queue.front()?;
        (*ready <= self.clock.now()).then_some(value)
    }

    pub fn pop(&mut self) -> Option<T> {
        let (ready, _) = self.queue.front()?;
        if *ready > self.clock.now() {
            return None;
        }
        self.queue.pop_front().map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

fn deliver<T>(port: &Ref<T>, cycle: u64, value: T) {
    let mut guard = port.lock();
    match guard.sink.clone() {
        Some(next) => {
            drop(guard);
            deliver(&next, cycle, value);
        }
        None => guard.insert(cycle, value),
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, Port};

    #[test]
    fn push_is_invisible_until_delivery_cycle() {
        let clock = Clock::new();
        let mut port = Port::new(clock.clone());
        port.push(42u32, 2);
        assert!(port.is_empty());
        assert_eq!(port.front(), None);
        clock.advance();
        assert!(port.is_empty());
        clock.advance();
        assert_eq!(port.front(), Some(&42));
        assert_eq!(port.pop(), Some(42));
        assert!(port.is_empty());
    }

    #[test]
    fn entries_order_by_delivery_cycle_then_push_order() {
        let clock = Clock::new();
        let mut port = Port::new(clock.clone());
        port.push(1u32, 5);
        port.push(2u32, 1);
        port.push(3u32, 5);
        for _ in 0..5 {
            clock.advance();
        }
        assert_eq!(port.pop(), Some(2));
        assert_eq!(port.pop(), Some(1));
        assert_eq!(port.pop(), Some(3));
    }

    #[test]
    fn bound_port_forwards_with_source_delay() {
        let clock = Clock::new();
        let source = Port::shared(&clock);
        let sink = Port::shared(&clock);
        source.lock().bind(&sink);

        source.lock().push(7u32, 3);
        assert_eq!(source.lock().in_flight(), 0);
        assert_eq!(sink.lock().in_flight(), 1);
        for _ in 0..3 {
            clock.advance();
        }
        assert_eq!(sink.lock().pop(), Some(7));
    }

    #[test]
    fn bind_chain_delivers_to_final_sink() {
        let clock = Clock::new();
        let a = Port::shared(&clock);
        let b = Port::shared(&clock);
        let c = Port::shared(&clock);
        a.lock().bind(&b);
        b.lock().bind(&c);

        a.lock().push(9u32, 1);
        clock.advance();
        assert_eq!(c.lock().pop(), Some(9));
    }

    #[test]
    #[should_panic(expected = "zero-delay push")]
    fn zero_delay_push_is_fatal() {
        let clock = Clock::new();
        let mut port = Port::new(clock);
        port.push(0u32, 0);
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn double_bind_is_fatal() {
        let clock = Clock::new();
        let sink = Port::<u32>::shared(&clock);
        let other = Port::<u32>::shared(&clock);
        let mut port = Port::new(clock);
        port.bind(&sink);
        port.bind(&other);
    }
}
