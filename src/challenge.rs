use rand::{thread_rng, Rng};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Source of the issuer's challenge index.
///
/// Soundness of the issuance rests on `draw` being uniform over
/// `0..range` and unpredictable to the requester.
pub trait IndexSource: Send + Sync {
    fn draw(&self, range: usize) -> usize;
}

impl<T: IndexSource + ?Sized> IndexSource for Arc<T> {
    fn draw(&self, range: usize) -> usize {
        (**self).draw(range)
    }
}

/// Uniform draws from the thread-local CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformIndex;

impl IndexSource for UniformIndex {
    fn draw(&self, range: usize) -> usize {
        thread_rng().gen_range(0..range)
    }
}

/// The index an issuer challenged, as handed to the requester.
///
/// Only an [`Issuance`](crate::Issuance) can produce one, so the slot a
/// requester withholds is always the slot the issuer picked.
///
/// ```compile_fail
/// let forged = ccbs::Challenge { index: 5, batch_size: 10 };
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Challenge {
    index: usize,
    batch_size: usize,
}

impl Challenge {
    pub(crate) fn new(index: usize, batch_size: usize) -> Self {
        Self { index, batch_size }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Replays a fixed sequence of indices, cycling when exhausted.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ScriptedIndex {
    script: Vec<usize>,
    cursor: AtomicUsize,
}

#[cfg(test)]
impl ScriptedIndex {
    pub(crate) fn new(script: Vec<usize>) -> Self {
        assert!(!script.is_empty(), "index script must not be empty");
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fixed(index: usize) -> Self {
        Self::new(vec![index])
    }

    pub(crate) fn draws(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl IndexSource for ScriptedIndex {
    fn draw(&self, _range: usize) -> usize {
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.script[n % self.script.len()]
    }
}
