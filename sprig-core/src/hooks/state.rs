//! Positional hook storage.

use std::any::Any;
use std::cell::{Cell, RefCell};

use crate::error::{Error, Result};
use crate::reactive::untrack;

/// Teardown registered by a hook slot; runs on unmount.
pub(crate) type SlotTeardown = Box<dyn FnOnce()>;

struct HookSlot {
    kind: &'static str,
    value: Box<dyn Any>,
    teardown: Option<SlotTeardown>,
}

/// The hook slots of one component instance.
#[derive(Default)]
pub(crate) struct HookState {
    slots: RefCell<Vec<HookSlot>>,
    cursor: Cell<usize>,
    rendering: Cell<bool>,
    /// Completed renders; slot count is checked from the second render on.
    renders: Cell<usize>,
}

impl HookState {
    pub(crate) fn begin_render(&self) {
        self.cursor.set(0);
        self.rendering.set(true);
    }

    /// Close a render. A successful render must have used exactly as many
    /// hooks as the previous ones when `strict` is set.
    pub(crate) fn end_render(&self, succeeded: bool, strict: bool) -> Result<()> {
        self.rendering.set(false);
        if !succeeded {
            return Ok(());
        }
        let used = self.cursor.get();
        let expected = self.len();
        if strict && self.renders.get() > 0 && used != expected {
            return Err(Error::HookOrderMismatch {
                expected: format!("{} hooks", expected),
                found: format!("{} hooks", used),
            });
        }
        self.renders.set(self.renders.get() + 1);
        Ok(())
    }

    pub(crate) fn is_rendering(&self) -> bool {
        self.rendering.get()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Claim the next slot, creating it with `init` on first use, and run
    /// `f` on its value. Returns the slot index along with `f`'s result.
    ///
    /// `f` runs while the slot table is borrowed and must not call hooks.
    pub(crate) fn next<T, R>(
        &self,
        kind: &'static str,
        strict: bool,
        init: impl FnOnce() -> Result<(T, Option<SlotTeardown>)>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<(usize, R)>
    where
        T: 'static,
    {
        if !self.rendering.get() {
            return Err(Error::HookContextMissing);
        }
        let index = self.cursor.get();
        self.cursor.set(index + 1);

        if index >= self.len() {
            if strict && self.renders.get() > 0 {
                return Err(Error::HookOrderMismatch {
                    expected: format!("{} hooks", self.len()),
                    found: format!("extra {} hook at position {}", kind, index),
                });
            }
            let (value, teardown) = init()?;
            self.slots.borrow_mut().push(HookSlot {
                kind,
                value: Box::new(value),
                teardown,
            });
        }

        self.with_slot(index, kind, f).map(|out| (index, out))
    }

    /// Run `f` on the value of an already claimed slot.
    pub(crate) fn with_slot<T, R>(
        &self,
        index: usize,
        kind: &'static str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R>
    where
        T: 'static,
    {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(index).ok_or_else(|| Error::HookOrderMismatch {
            expected: format!("slot {}", index),
            found: String::from("no slot"),
        })?;
        if slot.kind != kind {
            return Err(Error::HookOrderMismatch {
                expected: slot.kind.to_string(),
                found: kind.to_string(),
            });
        }
        let value = slot
            .value
            .downcast_mut::<T>()
            .ok_or_else(|| Error::HookOrderMismatch {
                expected: format!("{} of a different type", slot.kind),
                found: kind.to_string(),
            })?;
        Ok(f(value))
    }

    /// Run every slot teardown in reverse registration order and clear the
    /// table.
    pub(crate) fn teardown(&self) {
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        for slot in slots.into_iter().rev() {
            if let Some(teardown) = slot.teardown {
                untrack(teardown);
            }
        }
        self.cursor.set(0);
        self.renders.set(0);
    }
}
