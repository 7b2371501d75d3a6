use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Runs batches of independent jobs on a capped number of threads.
#[derive(Clone, Copy, Debug)]
pub struct RenderPool {
    jobs: usize,
}

impl RenderPool {
    pub fn new(jobs: usize) -> Self {
        RenderPool { jobs: jobs.max(1) }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Apply `f` to every item, at most `jobs` at a time, returning the
    /// results in input order.
    pub fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let workers = self.jobs.min(items.len());
        if workers <= 1 {
            return items.into_iter().map(f).collect();
        }

        let len = items.len();
        let queue: Vec<Mutex<Option<T>>> = items.into_iter().map(|i| Mutex::new(Some(i))).collect();
        let results: Vec<Mutex<Option<R>>> = (0..len).map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        if idx >= len {
                            break;
                        }
                        let item = lock(&queue[idx]).take();
                        if let Some(item) = item {
                            let result = f(item);
                            *lock(&results[idx]) = Some(result);
                        }
                    }
                });
            }
        });

        results
            .into_iter()
            .filter_map(|slot| slot.into_inner().unwrap_or_else(|e| e.into_inner()))
            .collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
