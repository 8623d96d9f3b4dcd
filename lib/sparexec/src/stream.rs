use crate::binding::{Binding, SolutionIter};
use crate::error::QueryEvaluationError;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A [`Stream`] of bindings suspending once after every produced binding.
///
/// Built with [`EvaluationContext::evaluate_stream`](crate::EvaluationContext::evaluate_stream).
/// Cancellation and timeout are checked by the underlying operators each time a binding is pulled.
pub struct SolutionStream<'a> {
    inner: SolutionIter<'a>,
    suspend: bool,
}

impl<'a> SolutionStream<'a> {
    pub fn new(inner: SolutionIter<'a>) -> Self {
        Self {
            inner,
            suspend: false,
        }
    }
}

impl Stream for SolutionStream<'_> {
    type Item = Result<Binding, QueryEvaluationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.suspend {
            self.suspend = false;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        let next = self.inner.next();
        self.suspend = next.is_some();
        Poll::Ready(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
