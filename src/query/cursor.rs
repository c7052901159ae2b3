use crate::document::Document;
use crate::errors::DbError;
use std::collections::VecDeque;

pub const DEFAULT_BATCH_SIZE: usize = 101;

/// Supplies result documents to a cursor, one batch at a time.
///
/// An empty batch marks the end of the results.
pub trait BatchSource: Send {
    /// # Errors
    /// Returns `DbError::StoreUnavailable` if the backing store can no longer serve documents.
    fn next_batch(&mut self, max: usize) -> Result<Vec<Document>, DbError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Exhausted,
}

/// A forward-only, lazily fetched result sequence.
///
/// Documents are pulled from the store in batches as the caller advances. Once the end has
/// been reported, any further `try_next` fails with `DbError::CursorExhausted`; a fresh find
/// is needed to read the results again. Dropping the cursor releases its source.
pub struct Cursor {
    source: Option<Box<dyn BatchSource>>,
    buffer: VecDeque<Document>,
    batch_size: usize,
    state: CursorState,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("buffered", &self.buffer.len())
            .field("batch_size", &self.batch_size)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    #[must_use]
    pub fn new(source: Box<dyn BatchSource>, batch_size: usize) -> Self {
        Self {
            source: Some(source),
            buffer: VecDeque::new(),
            batch_size: batch_size.max(1),
            state: CursorState::Open,
        }
    }

    /// A cursor over no documents.
    #[must_use]
    pub fn empty() -> Self {
        Self { source: None, buffer: VecDeque::new(), batch_size: 1, state: CursorState::Open }
    }

    /// Advances the cursor.
    ///
    /// Returns `Ok(None)` exactly once at the end of the results.
    ///
    /// # Errors
    /// `DbError::CursorExhausted` when called after the end was reported; otherwise whatever the
    /// batch source reports (typically `DbError::StoreUnavailable`).
    pub fn try_next(&mut self) -> Result<Option<Document>, DbError> {
        match self.state {
            CursorState::Exhausted => return Err(DbError::CursorExhausted),
            CursorState::Open => {}
        }
        if self.buffer.is_empty() {
            self.fill()?;
        }
        if let Some(doc) = self.buffer.pop_front() {
            return Ok(Some(doc));
        }
        self.state = CursorState::Exhausted;
        Ok(None)
    }

    fn fill(&mut self) -> Result<(), DbError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        let batch = source.next_batch(self.batch_size)?;
        if batch.is_empty() {
            self.source = None;
        } else {
            self.buffer.extend(batch);
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Drains the remaining documents.
    ///
    /// # Errors
    /// Propagates the first error raised while fetching.
    pub fn to_vec(mut self) -> Result<Vec<Document>, DbError> {
        let mut out = Vec::with_capacity(self.buffer.len());
        while let Some(d) = self.try_next()? {
            out.push(d);
        }
        Ok(out)
    }
}

impl IntoIterator for Cursor {
    type Item = Result<Document, DbError>;
    type IntoIter = CursorIter;

    fn into_iter(self) -> Self::IntoIter {
        CursorIter { cursor: self, done: false }
    }
}

/// Consuming iterator over a [`Cursor`]; stops after the first error.
#[derive(Debug)]
pub struct CursorIter {
    cursor: Cursor,
    done: bool,
}

impl Iterator for CursorIter {
    type Item = Result<Document, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.try_next() {
            Ok(Some(d)) => Some(Ok(d)),
            Ok(None) | Err(DbError::CursorExhausted) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for CursorIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    struct VecSource {
        docs: VecDeque<Document>,
    }

    impl VecSource {
        fn new(docs: Vec<Document>) -> Self {
            Self { docs: docs.into() }
        }
    }

    impl BatchSource for VecSource {
        fn next_batch(&mut self, max: usize) -> Result<Vec<Document>, DbError> {
            let n = max.min(self.docs.len());
            Ok(self.docs.drain(..n).collect())
        }
    }

    fn docs(n: i32) -> Vec<Document> {
        (0..n).map(|i| Document::new(doc! {"i": i})).collect()
    }

    struct Failing;
    impl BatchSource for Failing {
        fn next_batch(&mut self, _max: usize) -> Result<Vec<Document>, DbError> {
            Err(DbError::StoreUnavailable("connection closed".into()))
        }
    }

    #[test]
    fn yields_all_documents_across_batches() {
        let cur = Cursor::new(Box::new(VecSource::new(docs(7))), 3);
        let out = cur.to_vec().unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(out[6].get_i32("i").unwrap(), 6);
    }

    #[test]
    fn reading_past_the_end_fails_clearly() {
        let mut cur = Cursor::new(Box::new(VecSource::new(docs(1))), 10);
        assert!(cur.try_next().unwrap().is_some());
        assert!(cur.try_next().unwrap().is_none());
        assert!(cur.is_exhausted());
        assert!(matches!(cur.try_next(), Err(DbError::CursorExhausted)));
    }

    #[test]
    fn empty_cursor_ends_immediately() {
        let mut cur = Cursor::empty();
        assert!(cur.try_next().unwrap().is_none());
        assert!(matches!(cur.try_next(), Err(DbError::CursorExhausted)));
    }

    #[test]
    fn iterator_surfaces_source_errors_once() {
        let mut it = Cursor::new(Box::new(Failing), 5).into_iter();
        assert!(matches!(it.next(), Some(Err(DbError::StoreUnavailable(_)))));
        assert!(it.next().is_none());
    }
}
