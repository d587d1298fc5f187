use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct Inner<T: ?Sized> {
    items: Vec<Rc<T>>,
    to_remove: Vec<Rc<T>>,
    // Nesting depth of `for_each`; removals are deferred while > 0.
    depth: u32,
}

/// Subscriber list that tolerates removal from inside its own iteration.
///
/// Entries are identified by `Rc` pointer identity, so adding the same `Rc`
/// twice is a no-op. Single-threaded by construction (`Rc`/`RefCell`).
pub struct SafeActionList<T: ?Sized> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: ?Sized> Default for SafeActionList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> SafeActionList<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                items: Vec::new(),
                to_remove: Vec::new(),
                depth: 0,
            })),
        }
    }

    pub fn add(&self, item: Rc<T>) {
        let mut inner = self.inner.borrow_mut();
        if inner.items.iter().any(|it| Rc::ptr_eq(it, &item)) {
            // Re-adding during a pass cancels a deferred removal.
            inner.to_remove.retain(|it| !Rc::ptr_eq(it, &item));
            return;
        }
        inner.items.push(item);
    }

    pub fn remove(&self, item: &Rc<T>) {
        remove_from(&self.inner, item);
    }

    pub fn contains(&self, item: &Rc<T>) -> bool {
        let inner = self.inner.borrow();
        inner.items.iter().any(|it| Rc::ptr_eq(it, item))
            && !inner.to_remove.iter().any(|it| Rc::ptr_eq(it, item))
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `action` on every entry. Entries removed during the pass are still
    /// visited in this pass and dropped once it finishes; entries appended during
    /// the pass are visited if the cursor reaches them.
    pub fn for_each(&self, mut action: impl FnMut(&T)) {
        self.inner.borrow_mut().depth += 1;

        let mut index = 0;
        loop {
            let item = self.inner.borrow().items.get(index).cloned();
            let Some(item) = item else { break };
            action(&item);
            index += 1;
        }

        let mut inner = self.inner.borrow_mut();
        inner.depth -= 1;
        if inner.depth == 0 && !inner.to_remove.is_empty() {
            let pending = std::mem::take(&mut inner.to_remove);
            inner
                .items
                .retain(|it| !pending.iter().any(|p| Rc::ptr_eq(it, p)));
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.items.clear();
        inner.to_remove.clear();
    }
}

impl<T: ?Sized + 'static> SafeActionList<T> {
    /// Adds `item` and returns a handle that removes exactly that entry.
    pub fn subscribe(&self, item: Rc<T>) -> Subscription {
        self.add(Rc::clone(&item));
        let list: Weak<RefCell<Inner<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = list.upgrade() {
                remove_from(&inner, &item);
            }
        })
    }
}

fn remove_from<T: ?Sized>(inner: &RefCell<Inner<T>>, item: &Rc<T>) {
    let mut inner = inner.borrow_mut();
    if inner.depth > 0 {
        if !inner.to_remove.iter().any(|it| Rc::ptr_eq(it, item)) {
            inner.to_remove.push(Rc::clone(item));
        }
    } else if let Some(pos) = inner.items.iter().position(|it| Rc::ptr_eq(it, item)) {
        inner.items.remove(pos);
    }
}

impl<T: ?Sized> fmt::Debug for SafeActionList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SafeActionList")
            .field("len", &inner.items.len())
            .field("pending_removals", &inner.to_remove.len())
            .finish()
    }
}

/// Handle to one registered callback. Releasing it (explicitly or on drop)
/// unregisters the callback; releasing twice does nothing.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn dispose(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Keeps the callback registered for the lifetime of its list.
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Notification fan-out with disposable subscriptions.
pub struct Signal<A: ?Sized> {
    listeners: SafeActionList<dyn Fn(&A)>,
}

impl<A: ?Sized + 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized + 'static> Signal<A> {
    pub fn new() -> Self {
        Self {
            listeners: SafeActionList::new(),
        }
    }

    pub fn connect(&self, listener: impl Fn(&A) + 'static) -> Subscription {
        let listener: Rc<dyn Fn(&A)> = Rc::new(listener);
        self.listeners.subscribe(listener)
    }

    pub fn emit(&self, args: &A) {
        self.listeners.for_each(|listener| listener(args));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn clear(&self) {
        self.listeners.clear();
    }
}

impl<A: ?Sized> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners)
            .finish()
    }
}
