use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct WatchState {
    next_id: u64,
    live: BTreeMap<u64, Instant>,
    completed: u64,
    longest: Duration,
}

/// Tracks how long batched keys stay outstanding.
///
/// One registry exists per object kind. Every unique key in a batch holds a
/// [`RequestWatch`] from grouping time until all of its waiters have been
/// resolved or deferred.
#[derive(Debug, Default)]
pub struct RequestWatches {
    state: Mutex<WatchState>,
}

impl RequestWatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing one outstanding key.
    pub fn start(&self) -> RequestWatch<'_> {
        let started = Instant::now();
        let mut state = self.state.lock().expect("lock poisoned");
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(id, started);
        RequestWatch {
            watches: self,
            id,
            started,
            released: false,
        }
    }

    /// Number of keys currently outstanding.
    pub fn live(&self) -> usize {
        self.state.lock().expect("lock poisoned").live.len()
    }

    /// Number of watches released so far.
    pub fn completed(&self) -> u64 {
        self.state.lock().expect("lock poisoned").completed
    }

    /// How long the oldest outstanding key has been waiting.
    pub fn oldest_outstanding(&self) -> Option<Duration> {
        let state = self.state.lock().expect("lock poisoned");
        state.live.values().next().map(Instant::elapsed)
    }

    /// Longest time any released watch was held.
    pub fn longest(&self) -> Duration {
        self.state.lock().expect("lock poisoned").longest
    }

    fn release(&self, id: u64, elapsed: Duration) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.live.remove(&id).is_some() {
            state.completed += 1;
            state.longest = state.longest.max(elapsed);
        }
    }
}

/// A held measurement for one outstanding key.
///
/// Released by [`finish`](Self::finish) or, failing that, on drop.
#[derive(Debug)]
pub struct RequestWatch<'a> {
    watches: &'a RequestWatches,
    id: u64,
    started: Instant,
    released: bool,
}

impl RequestWatch<'_> {
    /// Time since the watch started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Release the watch and return how long it was held.
    pub fn finish(mut self) -> Duration {
        self.release()
    }

    fn release(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.released {
            self.released = true;
            self.watches.release(self.id, elapsed);
        }
        elapsed
    }
}

impl Drop for RequestWatch<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
