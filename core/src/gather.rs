//! Fan-out over several coroutines.
//!
//! Every child is started as its own task before the caller awaits any of
//! them, so they make progress concurrently. A failing child never cancels
//! its siblings: all of them run to completion and every failure is reported.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use thiserror::Error;

use crate::runtime::Runtime;

/// One or more children of a [`Runtime::gather`] failed.
#[derive(Debug, Error)]
#[error("{} of {total} gathered tasks failed{}", failures.len(), render_failures(failures))]
pub struct GatherError {
    /// Failures in positional order, each with its child's index.
    pub failures: Vec<(usize, anyhow::Error)>,
    /// Number of children that were started.
    pub total: usize,
}

fn render_failures(failures: &[(usize, anyhow::Error)]) -> String {
    failures
        .iter()
        .map(|(index, err)| format!("; [{index}] {err:#}"))
        .collect()
}

impl Runtime {
    /// Run all `futures` concurrently and return each child's result in input
    /// order, successes and failures alike.
    ///
    /// If a child cannot be started, the children already running are awaited
    /// and discarded before the scheduler error is returned, so none of their
    /// results stay parked.
    pub async fn gather_settled<T, F, I>(&self, futures: I) -> anyhow::Result<Vec<anyhow::Result<T>>>
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
        I: IntoIterator<Item = F>,
    {
        let mut handles = Vec::new();
        for future in futures {
            match self.create_task(future) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    for handle in handles {
                        drop(handle.await);
                    }
                    return Err(err.into());
                }
            }
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await);
        }
        Ok(results)
    }

    /// Run all `futures` concurrently and return their values in input order.
    ///
    /// Fails with a [`GatherError`] naming every child that failed, once all
    /// children have finished.
    pub async fn gather<T, F, I>(&self, futures: I) -> anyhow::Result<Vec<T>>
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
        I: IntoIterator<Item = F>,
    {
        let settled = self.gather_settled(futures).await?;
        let total = settled.len();
        let mut values = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (index, result) in settled.into_iter().enumerate() {
            match result {
                Ok(value) => values.push(value),
                Err(err) => failures.push((index, err)),
            }
        }
        if failures.is_empty() {
            Ok(values)
        } else {
            Err(GatherError { failures, total }.into())
        }
    }

    /// [`Runtime::gather`] over a keyed collection.
    pub async fn gather_keyed<K, T, F>(&self, futures: HashMap<K, F>) -> anyhow::Result<HashMap<K, T>>
    where
        K: Eq + Hash,
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        let (keys, futures): (Vec<K>, Vec<F>) = futures.into_iter().unzip();
        let values = self.gather(futures).await?;
        Ok(keys.into_iter().zip(values).collect())
    }
}
