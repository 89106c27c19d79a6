/// How an engine run ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Canceled,
}

impl<T> Outcome<T> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Canceled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Canceled => Outcome::Canceled,
        }
    }
}

/// Holds the most recent successfully computed results of an engine.
///
/// A value is only replaced by [`ResultCache::publish`], so a canceled or
/// failed re-evaluation leaves the previous (stale but valid) results readable.
#[derive(Debug, Clone)]
pub struct ResultCache<T> {
    current: Option<T>,
    generation: u64,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, value: T) {
        self.current = Some(value);
        self.generation += 1;
    }

    pub fn results(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Number of times results have been published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
