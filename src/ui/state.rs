use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A shared, observable value cell. Clones point at the same value.
#[derive(Clone)]
pub struct Binding<T: 'static> {
    cell: Rc<RefCell<T>>,
}

impl<T: 'static> Binding<T> {
    pub fn new(initial: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(initial)),
        }
    }
}

impl<T: Clone + 'static> Binding<T> {
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.cell.borrow_mut() = value;
        notify_state_changed();
    }

    pub fn update(&self, updater: impl FnOnce(&mut T)) {
        updater(&mut self.cell.borrow_mut());
        notify_state_changed();
    }
}

impl<T: 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").finish()
    }
}

impl<T: 'static> PartialEq for Binding<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

thread_local! {
    static STATE_GENERATION: Cell<u64> = const { Cell::new(0) };
}

/// Counts [`Binding`] writes on this thread. Each viewport compares it with
/// the value it saw at its last frame, so one consumer never hides a change
/// from another.
pub fn state_generation() -> u64 {
    STATE_GENERATION.with(Cell::get)
}

fn notify_state_changed() {
    STATE_GENERATION.with(|generation| generation.set(generation.get().wrapping_add(1)));
}
