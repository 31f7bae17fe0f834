//! Best-of-N frame selection.
//!
//! Encoded JPEG size stands in for scene detail: a sharper, richer frame
//! compresses to more bytes. The selector keeps only the current best; a
//! candidate that does not strictly beat it is dropped (returned to the
//! driver) immediately, so ties go to the earliest frame and at most two
//! frames are ever alive (the best plus the one being judged).

use core::ops::Deref;

pub struct BestOf<F> {
    best: Option<F>,
    offered: usize,
}

impl<F: Deref<Target = [u8]>> BestOf<F> {
    pub fn new() -> Self {
        Self {
            best: None,
            offered: 0,
        }
    }

    /// Judge one candidate.  Returns `true` if it became the new best.
    pub fn offer(&mut self, frame: F) -> bool {
        self.offered += 1;
        let better = match &self.best {
            Some(best) => frame.len() > best.len(),
            None => true,
        };
        if better {
            // Old best is released here.
            self.best = Some(frame);
        }
        better
    }

    /// Size of the current best, if any.
    pub fn best_len(&self) -> Option<usize> {
        self.best.as_ref().map(|f| f.len())
    }

    pub fn offered(&self) -> usize {
        self.offered
    }

    pub fn into_best(self) -> Option<F> {
        self.best
    }
}

impl<F: Deref<Target = [u8]>> Default for BestOf<F> {
    fn default() -> Self {
        Self::new()
    }
}
