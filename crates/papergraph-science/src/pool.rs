use std::future::Future;

use futures::StreamExt;

/// Bounded-width parallel map. At most `width` jobs run at once; results come
/// back in input order regardless of completion order.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub async fn map<I, F, Fut>(&self, items: I, job: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        futures::stream::iter(items)
            .map(job)
            .buffered(self.width)
            .collect()
            .await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(16)
    }
}
