use std::ops::{Deref, DerefMut};

/// Request handed to a [`Layer`](crate::Layer) which the layer may take ownership of.
///
/// Wraps the `&mut Option<T>` the endpoint iterates with, the option is always `Some`
/// while the wrapper exists.
pub struct MayTake<'a, T> {
    slot: &'a mut Option<T>,
}

impl<'a, T> MayTake<'a, T> {
    pub fn new(slot: &'a mut Option<T>) -> Self {
        assert!(slot.is_some(), "MayTake created over an empty slot");

        Self { slot }
    }

    /// Assume ownership, the endpoint stops passing the value to other layers
    pub fn take(self) -> T {
        match self.slot.take() {
            Some(value) => value,
            None => unreachable!("MayTake slot is always filled"),
        }
    }
}

impl<T> Deref for MayTake<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self.slot.as_ref() {
            Some(value) => value,
            None => unreachable!("MayTake slot is always filled"),
        }
    }
}

impl<T> DerefMut for MayTake<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.slot.as_mut() {
            Some(value) => value,
            None => unreachable!("MayTake slot is always filled"),
        }
    }
}
