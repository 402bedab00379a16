//! Two-way run merger.

use std::io::prelude::*;
use std::marker::PhantomData;

use crate::line::{write_line, LineError, LineReader};

/// Two-way merger implementation.
/// Merges two sorted inputs into a single sorted output, keeping every item of both inputs.
///
/// Items are compared with strict less-than: when the pending items are equal the right one
/// is emitted first. Once one input is exhausted the rest of the other is drained unchanged.
pub struct TwoWayMerger<T, E, L, R>
where
    T: Ord,
    L: Iterator<Item = Result<T, E>>,
    R: Iterator<Item = Result<T, E>>,
{
    left: L,
    right: R,
    left_head: Option<T>,
    right_head: Option<T>,
    initiated: bool,
    failed: bool,

    error_type: PhantomData<E>,
}

impl<T, E, L, R> TwoWayMerger<T, E, L, R>
where
    T: Ord,
    L: Iterator<Item = Result<T, E>>,
    R: Iterator<Item = Result<T, E>>,
{
    /// Creates a merger over two inputs.
    /// Inputs should be sorted in ascending order otherwise the result is undefined.
    pub fn new<LI, RI>(left: LI, right: RI) -> Self
    where
        LI: IntoIterator<IntoIter = L, Item = Result<T, E>>,
        RI: IntoIterator<IntoIter = R, Item = Result<T, E>>,
    {
        TwoWayMerger {
            left: left.into_iter(),
            right: right.into_iter(),
            left_head: None,
            right_head: None,
            initiated: false,
            failed: false,
            error_type: PhantomData,
        }
    }

    fn pull(input: &mut impl Iterator<Item = Result<T, E>>) -> Result<Option<T>, E> {
        input.next().transpose()
    }

    fn init(&mut self) -> Result<(), E> {
        self.initiated = true;
        self.left_head = Self::pull(&mut self.left)?;
        self.right_head = Self::pull(&mut self.right)?;
        Ok(())
    }

    fn step(&mut self) -> Result<Option<T>, E> {
        let take_left = match (&self.left_head, &self.right_head) {
            (Some(left), Some(right)) => left < right,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return Ok(None),
        };

        let item = if take_left {
            let item = self.left_head.take();
            self.left_head = Self::pull(&mut self.left)?;
            item
        } else {
            let item = self.right_head.take();
            self.right_head = Self::pull(&mut self.right)?;
            item
        };

        return Ok(item);
    }
}

impl<T, E, L, R> Iterator for TwoWayMerger<T, E, L, R>
where
    T: Ord,
    L: Iterator<Item = Result<T, E>>,
    R: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = if self.initiated {
            self.step()
        } else {
            self.init().and_then(|_| self.step())
        };

        match result {
            Ok(item) => item.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Merges two sorted runs of lines into the output stream.
/// Returns the number of lines written.
pub fn merge_runs<L: BufRead, R: BufRead, W: Write>(
    left: LineReader<L>,
    right: LineReader<R>,
    output: &mut W,
) -> Result<usize, LineError> {
    let mut written = 0;
    for line in TwoWayMerger::new(left, right) {
        write_line(output, &line?)?;
        written += 1;
    }

    return Ok(written);
}
