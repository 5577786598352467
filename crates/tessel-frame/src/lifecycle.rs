/// Change in whether a port must be kept running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The count left zero; the channel is now required.
    Referenced,
    /// The count reached zero; the channel is no longer required.
    Unreferenced,
    Unchanged,
}

/// Counts the reasons a port's channel has to stay serviced.
///
/// One unit per outstanding reply descriptor, one while a UART stream is open
/// and one per armed interrupt. Only the edges matter to the channel: the
/// keep-alive flag follows [`Transition::Referenced`] and
/// [`Transition::Unreferenced`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    count: usize,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> Transition {
        self.count += 1;
        if self.count == 1 {
            Transition::Referenced
        } else {
            Transition::Unchanged
        }
    }

    /// Drop one unit. Releasing at zero is a no-op but still reports
    /// `Unreferenced` so the channel flag is forced down.
    pub fn release(&mut self) -> Transition {
        self.count = self.count.saturating_sub(1);
        if self.count == 0 {
            Transition::Unreferenced
        } else {
            Transition::Unchanged
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_idle(&self) -> bool {
        self.count == 0
    }
}
