//! batch — mini-batch data streams feeding the objective.
//!
//! Purpose
//! -------
//! Define the pull-based stream contract that supplies one batch element per
//! accepted iterate, plus the two stock implementations: a finite restartable
//! vector stream and a sentinel stream for problems without data.
//!
//! Key behaviors
//! -------------
//! - [`MiniBatchStream::next_item`] hands out the next element or `None` on
//!   exhaustion; exhaustion downstream forces an early halt of the solve.
//! - [`SentinelStream`] never exhausts: it clones a single element forever,
//!   so data-free problems run under exactly the same machinery as batched
//!   ones.
//! - [`VecStream`] walks its elements once per solve and supports
//!   [`MiniBatchStream::reset`] so one stream can serve repeated solves.
//!
//! Conventions
//! -----------
//! - Streams are consulted once per accepted iterate, after the trace
//!   callback for that iterate has run. The first element is loaded before
//!   iteration zero.

/// Pull-based source of mini-batch elements.
///
/// Implementors decide batching policy entirely on their side; the dispatch
/// layer only ever asks for "the next element".
pub trait MiniBatchStream<D> {
    /// Next element, or `None` once the stream is exhausted.
    fn next_item(&mut self) -> Option<D>;

    /// Rewind the stream so a subsequent solve starts from the beginning.
    fn reset(&mut self);
}

/// Stream that yields one fixed element forever.
///
/// Used when a problem has no data: the element is typically `()` and every
/// objective evaluation receives the same trailing argument.
pub struct SentinelStream<D: Clone> {
    item: D,
}

impl<D: Clone> SentinelStream<D> {
    pub fn new(item: D) -> Self {
        Self { item }
    }
}

impl<D: Clone> MiniBatchStream<D> for SentinelStream<D> {
    fn next_item(&mut self) -> Option<D> {
        Some(self.item.clone())
    }

    fn reset(&mut self) {}
}

/// Finite stream over a vector of batch elements.
pub struct VecStream<D: Clone> {
    items: Vec<D>,
    cursor: usize,
}

impl<D: Clone> VecStream<D> {
    pub fn new(items: Vec<D>) -> Self {
        Self { items, cursor: 0 }
    }
}

impl<D: Clone> MiniBatchStream<D> for VecStream<D> {
    fn next_item(&mut self) -> Option<D> {
        let item = self.items.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Verify the sentinel stream never exhausts.
    //
    // Given
    // -----
    // - A sentinel stream over a single element.
    //
    // Expect
    // ------
    // - Many consecutive pulls all return the element.
    fn sentinel_stream_never_exhausts() {
        // Arrange
        let mut stream = SentinelStream::new(7_u32);

        // Act / Assert
        for _ in 0..100 {
            assert_eq!(stream.next_item(), Some(7));
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the vector stream yields each element once and rewinds on
    // reset.
    //
    // Given
    // -----
    // - A vector stream over three elements.
    //
    // Expect
    // ------
    // - Three pulls yield the elements in order, the fourth yields None, and
    //   after reset the first element comes back.
    fn vec_stream_exhausts_and_resets() {
        // Arrange
        let mut stream = VecStream::new(vec![1, 2, 3]);

        // Act / Assert
        assert_eq!(stream.next_item(), Some(1));
        assert_eq!(stream.next_item(), Some(2));
        assert_eq!(stream.next_item(), Some(3));
        assert_eq!(stream.next_item(), None);

        stream.reset();
        assert_eq!(stream.next_item(), Some(1));
    }
}
