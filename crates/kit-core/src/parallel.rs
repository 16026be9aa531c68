//! Bounded worker pool
//!
//! Refreshing or installing independent namespaces is embarrassingly
//! parallel; the cap keeps remote hosts and the local disk sane. Within one
//! namespace all work stays strictly sequential; callers hand this pool
//! whole-namespace jobs only.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default worker cap for network-bound namespace jobs.
pub const DEFAULT_WORKERS: usize = 5;

/// Run `job` over `items` with at most `cap` worker threads.
///
/// Results come back in input order. Panics in a job propagate once the
/// scope joins, like any scoped-thread panic.
pub fn run_bounded<T, R, F>(items: &[T], cap: usize, job: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = cap.clamp(1, items.len());
    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<R>>> = items.iter().map(|_| Mutex::new(None)).collect();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else { break };
                    let result = job(item);
                    *slots[index].lock().expect("result slot poisoned") = Some(result);
                }
            });
        }
    });

    slots
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .expect("result slot poisoned")
                .expect("worker filled every claimed slot")
        })
        .collect()
}
