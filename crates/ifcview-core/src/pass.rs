// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resumable batch passes
//!
//! A pass does a bounded amount of work per [`Pass::step`] and reports
//! progress after each batch. Drivers decide what happens between steps:
//! [`run_blocking`] loops straight through, [`run_async`] awaits a yield
//! future so a browser event loop can paint.

use crate::cancel::CancellationToken;
use crate::error::Result;
use std::future::Future;
use std::ops::Range;

/// Outcome of one step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// A batch completed and more work remains
    Yielded,
    /// The pass is complete
    Done,
}

/// Progress callback, called with `(done, total)`
pub type ProgressFn = Box<dyn FnMut(usize, usize)>;

/// A batched unit of work
pub trait Pass {
    type Output;

    /// Process one batch
    ///
    /// Returns `Err(Cancelled)` if the pass's token was cancelled before the
    /// batch started. Calling `step` after `Done` is a no-op.
    fn step(&mut self) -> Result<Step>;

    /// Current `(done, total)`
    fn progress(&self) -> (usize, usize);

    /// Consume the pass and return what it built
    fn into_output(self) -> Self::Output;
}

/// Drive a pass to completion without yielding
pub fn run_blocking<P: Pass>(mut pass: P) -> Result<P::Output> {
    while pass.step()? == Step::Yielded {}
    Ok(pass.into_output())
}

/// Drive a pass, awaiting `yield_now()` between batches
pub async fn run_async<P, F, Fut>(mut pass: P, mut yield_now: F) -> Result<P::Output>
where
    P: Pass,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        match pass.step()? {
            Step::Yielded => yield_now().await,
            Step::Done => return Ok(pass.into_output()),
        }
    }
}

/// Position bookkeeping shared by the passes
pub(crate) struct BatchCursor {
    position: usize,
    total: usize,
    batch_size: usize,
    finished: bool,
    cancel: CancellationToken,
    on_progress: Option<ProgressFn>,
}

impl BatchCursor {
    pub(crate) fn new(total: usize, batch_size: usize) -> Self {
        Self {
            position: 0,
            total,
            batch_size: batch_size.max(1),
            finished: false,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    pub(crate) fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    pub(crate) fn set_cancel(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub(crate) fn set_progress(&mut self, on_progress: ProgressFn) {
        self.on_progress = Some(on_progress);
    }

    /// Range of the next batch, or `None` once finished
    pub(crate) fn next_batch(&self) -> Result<Option<Range<usize>>> {
        if self.finished {
            return Ok(None);
        }
        self.cancel.check()?;
        let end = self.position.saturating_add(self.batch_size).min(self.total);
        Ok(Some(self.position..end))
    }

    /// Mark a batch processed and report progress
    pub(crate) fn complete(&mut self, batch: Range<usize>) -> Step {
        self.position = batch.end;
        if let Some(report) = self.on_progress.as_mut() {
            report(self.position, self.total);
        }
        if self.position >= self.total {
            self.finished = true;
            Step::Done
        } else {
            Step::Yielded
        }
    }

    pub(crate) fn progress(&self) -> (usize, usize) {
        (self.position, self.total)
    }
}
