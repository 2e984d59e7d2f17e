use smol_str::SmolStr;
use std::fmt;

type UpdateAction<E> = Box<dyn FnMut(&mut E)>;

/// The `(path, update action)` registry behind every `bind_*` method.
///
/// Actions are run by [`PropertyBindings::apply`] during a binding refresh
/// pass. Each action must go through the element's ordinary setter so that a
/// refresh which produces the same value leaves the element untouched.
pub struct PropertyBindings<E: ?Sized> {
    entries: Vec<(SmolStr, UpdateAction<E>)>,
}

impl<E: ?Sized> Default for PropertyBindings<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: ?Sized> PropertyBindings<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `update` under `path`, replacing an earlier binding of the same path.
    pub fn bind<F>(&mut self, path: impl Into<SmolStr>, update: F)
    where
        F: FnMut(&mut E) + 'static,
    {
        let path = path.into();
        let update: UpdateAction<E> = Box::new(update);
        match self.entries.iter_mut().find(|(existing, _)| *existing == path) {
            Some(entry) => entry.1 = update,
            None => self.entries.push((path, update)),
        }
    }

    pub fn unbind(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| existing != path);
        before != self.entries.len()
    }

    pub fn is_bound(&self, path: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply(&mut self, target: &mut E) -> usize {
        for (_, update) in &mut self.entries {
            update(target);
        }
        self.entries.len()
    }
}

impl<E: ?Sized> fmt::Debug for PropertyBindings<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.paths()).finish()
    }
}
