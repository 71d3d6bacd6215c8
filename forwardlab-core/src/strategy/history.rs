//! History — the bars a strategy is allowed to see at one point in the loop.

use crate::domain::Bar;

/// Read-only view of `bars[0..=index]`.
///
/// The slice physically ends at the current bar, so a decision evaluated
/// through a `History` cannot observe later bars.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    bars: &'a [Bar],
}

impl<'a> History<'a> {
    /// View of `bars` up to and including `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn new(bars: &'a [Bar], index: usize) -> Self {
        Self {
            bars: &bars[..=index],
        }
    }

    /// Index of the current bar.
    pub fn index(&self) -> usize {
        self.bars.len() - 1
    }

    pub fn current(&self) -> &'a Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// The bar before the current one, if any.
    pub fn previous(&self) -> Option<&'a Bar> {
        self.back(1)
    }

    /// The bar `n` positions before the current one (0 = current).
    pub fn back(&self, n: usize) -> Option<&'a Bar> {
        self.index().checked_sub(n).map(|i| &self.bars[i])
    }

    pub fn bar(&self, index: usize) -> Option<&'a Bar> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    /// Current and previous value of a named indicator, both defined.
    pub fn indicator_pair(&self, name: &str) -> Option<(f64, f64)> {
        let now = self.current().indicator(name)?;
        let before = self.previous()?.indicator(name)?;
        Some((now, before))
    }
}
