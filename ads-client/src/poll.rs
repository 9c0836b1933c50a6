//! Fixed-rate poll groups
//!
//! Each group owns one thread that invokes its callbacks in registration
//! order, then sleeps for whatever is left of the period. A callback that
//! fails or panics is logged and removed from the group; when that leaves
//! the group empty its owner is told so it can drop the group.

use crate::queue::panic_message;
use ads_core::{AdsResult, DeviceIdentity};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub(crate) type PollCallback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Invoked from the poll thread when an eviction empties the group
pub(crate) type EmptyHook = Box<dyn Fn() + Send>;

// Unique across groups, so a stale id never matches a later group's entry
static NEXT_POLL_ID: AtomicU64 = AtomicU64::new(0);

/// Membership of a callback in a poll group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollId(u64);

struct PollEntry {
    id: PollId,
    label: String,
    callback: PollCallback,
}

/// Callbacks polled at one rate on one device
///
/// Dropping the group stops its thread after the current cycle.
pub(crate) struct PollGroup {
    entries: Arc<Mutex<Vec<PollEntry>>>,
    // Dropping the sender wakes and stops the thread
    _stop: Sender<()>,
}

impl PollGroup {
    pub(crate) fn spawn(
        identity: &DeviceIdentity,
        rate: Duration,
        thread_name_prefix: &str,
        on_empty: EmptyHook,
    ) -> AdsResult<Self> {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);

        thread::Builder::new()
            .name(format!("{}-poll-{:.3}", thread_name_prefix, rate.as_secs_f64()))
            .spawn({
                let identity = identity.clone();
                let entries = Arc::clone(&entries);
                move || run_poll_loop(identity, rate, entries, stop_rx, on_empty)
            })?;

        log::debug!(
            "Started poll group {} @ {:.3} sec",
            identity,
            rate.as_secs_f64()
        );
        Ok(Self {
            entries,
            _stop: stop_tx,
        })
    }

    /// Append a callback; it runs from the next cycle on
    pub(crate) fn add(&mut self, label: impl Into<String>, callback: PollCallback) -> PollId {
        let id = PollId(NEXT_POLL_ID.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push(PollEntry {
            id,
            label: label.into(),
            callback,
        });
        id
    }

    /// Remove a callback; false if it was already gone
    pub(crate) fn remove(&mut self, id: PollId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn stop_requested(stop: &Receiver<()>) -> bool {
    !matches!(stop.try_recv(), Err(TryRecvError::Empty))
}

fn run_poll_loop(
    identity: DeviceIdentity,
    rate: Duration,
    entries: Arc<Mutex<Vec<PollEntry>>>,
    stop: Receiver<()>,
    on_empty: EmptyHook,
) {
    let secs = rate.as_secs_f64();
    log::debug!("Poll thread {} @ {:.3} sec started", identity, secs);

    'cycles: loop {
        let started = Instant::now();
        let cycle: Vec<(PollId, String, PollCallback)> = entries
            .lock()
            .iter()
            .map(|entry| (entry.id, entry.label.clone(), Arc::clone(&entry.callback)))
            .collect();

        for (id, label, callback) in cycle {
            if stop_requested(&stop) {
                break 'cycles;
            }
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| (*callback)())) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            log::error!(
                "Poll thread {} @ {:.3} sec failure in {}: {}",
                identity,
                secs,
                label,
                failure
            );
            let emptied = {
                let mut entries = entries.lock();
                entries.retain(|entry| entry.id != id);
                entries.is_empty()
            };
            if emptied {
                on_empty();
            }
        }

        let remaining = rate.saturating_sub(started.elapsed());
        match stop.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::debug!("Poll thread {} @ {:.3} sec stopped", identity, secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_identity, wait_until};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn group(rate: Duration) -> PollGroup {
        PollGroup::spawn(&test_identity(), rate, "test", Box::new(|| {})).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, PollCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let callback: PollCallback = {
            let count = Arc::clone(&count);
            Arc::new(move || -> anyhow::Result<()> {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        (count, callback)
    }

    #[test]
    fn test_cycle_spacing() {
        let rate = Duration::from_millis(50);
        let starts = Arc::new(Mutex::new(Vec::new()));
        let mut group = group(rate);
        group.add("record", {
            let starts = Arc::clone(&starts);
            Arc::new(move || -> anyhow::Result<()> {
                starts.lock().push(Instant::now());
                Ok(())
            })
        });

        assert!(wait_until(Duration::from_secs(3), || starts.lock().len() >= 6));
        drop(group);

        let starts = starts.lock();
        let gaps: Vec<Duration> = starts.windows(2).map(|w| w[1] - w[0]).collect();
        for gap in &gaps {
            assert!(*gap >= Duration::from_millis(45), "gap {:?} too short", gap);
        }
        let mean = gaps.iter().sum::<Duration>() / gaps.len() as u32;
        assert!(mean < Duration::from_millis(90), "mean gap {:?}", mean);
    }

    #[test]
    fn test_slow_callback_shortens_sleep() {
        let rate = Duration::from_millis(60);
        let starts = Arc::new(Mutex::new(Vec::new()));
        let mut group = group(rate);
        group.add("slow", {
            let starts = Arc::clone(&starts);
            Arc::new(move || -> anyhow::Result<()> {
                starts.lock().push(Instant::now());
                thread::sleep(Duration::from_millis(40));
                Ok(())
            })
        });

        assert!(wait_until(Duration::from_secs(3), || starts.lock().len() >= 4));
        drop(group);

        let starts = starts.lock();
        let total = starts[3] - starts[0];
        // Three periods, not three periods plus the callback cost
        assert!(total < Duration::from_millis(3 * 60 + 60), "{:?}", total);
    }

    #[test]
    fn test_failing_callback_removed_after_first_failure() {
        let mut group = group(Duration::from_millis(10));
        let failures = Arc::new(AtomicUsize::new(0));
        group.add("fail", {
            let failures = Arc::clone(&failures);
            Arc::new(move || -> anyhow::Result<()> {
                failures.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("device unreachable"))
            })
        });
        let (count, healthy) = counter();
        group.add("healthy", healthy);

        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 5));
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_panicking_callback_removed() {
        let mut group = group(Duration::from_millis(10));
        group.add(
            "panic",
            Arc::new(|| -> anyhow::Result<()> { panic!("bad sample") }),
        );
        let (count, healthy) = counter();
        group.add("healthy", healthy);

        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 3));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_eviction_of_last_callback_reports_empty() {
        let emptied = Arc::new(AtomicUsize::new(0));
        let on_empty: EmptyHook = {
            let emptied = Arc::clone(&emptied);
            Box::new(move || {
                emptied.fetch_add(1, Ordering::SeqCst);
            })
        };
        let mut group =
            PollGroup::spawn(&test_identity(), Duration::from_millis(10), "test", on_empty)
                .unwrap();
        let (count, healthy) = counter();
        let healthy_id = group.add("healthy", healthy);
        group.add(
            "fail",
            Arc::new(|| -> anyhow::Result<()> { Err(anyhow::anyhow!("read failed")) }),
        );

        // Evicting one of two callbacks leaves the group alive
        assert!(wait_until(Duration::from_secs(2), || group.len() == 1));
        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 3));
        assert_eq!(emptied.load(Ordering::SeqCst), 0);

        group.remove(healthy_id);
        group.add(
            "fail again",
            Arc::new(|| -> anyhow::Result<()> { Err(anyhow::anyhow!("read failed")) }),
        );
        assert!(wait_until(Duration::from_secs(2), || {
            emptied.load(Ordering::SeqCst) == 1
        }));
        assert!(group.is_empty());
    }

    #[test]
    fn test_ids_unique_across_groups() {
        let rate = Duration::from_secs(60);
        let mut first = group(rate);
        let mut second = group(rate);
        let (_, callback) = counter();
        let stale = first.add("a", Arc::clone(&callback));
        second.add("b", callback);

        assert!(!second.remove(stale));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_remove_and_stop() {
        let mut group = group(Duration::from_millis(10));
        let (count, callback) = counter();
        let id = group.add("count", callback);

        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 1));
        assert!(group.remove(id));
        assert!(!group.remove(id));
        assert!(group.is_empty());

        thread::sleep(Duration::from_millis(30));
        let after_remove = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_remove);
    }
}
