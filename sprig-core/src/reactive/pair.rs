//! Getter/setter pairs over a single signal.

use std::fmt;

use super::signal::Signal;
use crate::error::Result;

/// Read half of [`create_signal`].
pub struct ReadSignal<T>(Signal<T>);

/// Write half of [`create_signal`].
pub struct WriteSignal<T>(Signal<T>);

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T: Clone + PartialEq + 'static> ReadSignal<T> {
    /// Current value, tracked.
    pub fn get(&self) -> T {
        self.0.get()
    }

    /// Current value, tracked, or an error if disposed.
    pub fn try_get(&self) -> Result<T> {
        self.0.try_get()
    }

    /// Current value, untracked.
    pub fn get_untracked(&self) -> T {
        self.0.get_untracked()
    }

    /// The underlying signal.
    pub fn signal(&self) -> Signal<T> {
        self.0
    }
}

impl<T: Clone + PartialEq + 'static> WriteSignal<T> {
    /// Write a new value.
    pub fn set(&self, value: T) {
        self.0.set(value)
    }

    /// Write a value derived from the previous one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.0.update(f)
    }

    /// Write a new value, reporting disposal or flush errors.
    pub fn try_set(&self, value: T) -> Result<()> {
        self.0.try_set(value)
    }
}

impl<T> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.0.id()).finish()
    }
}

impl<T> fmt::Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteSignal").field(&self.0.id()).finish()
    }
}

/// Create a signal and split it into a getter and a setter.
pub fn create_signal<T: Clone + PartialEq + 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let signal = Signal::new(value);
    (ReadSignal(signal), WriteSignal(signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_reads_and_writes_one_cell() {
        let (count, set_count) = create_signal(1);
        set_count.set(2);
        assert_eq!(count.get(), 2);

        set_count.update(|n| n * 10);
        assert_eq!(count.get(), 20);
        assert_eq!(count.signal().get_untracked(), 20);
    }
}
