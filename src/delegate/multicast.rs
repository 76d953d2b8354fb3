//! Multicast delegate: an ordered invocation list.

use {
    crate::delegate::binding::{arc_addr, DelegateBinding, DelegateHandle},
    smallvec::SmallVec,
    std::{
        cell::{Cell, RefCell},
        fmt::{self, Debug, Formatter},
        mem,
        sync::Arc,
    },
};

/// One invocation-list position.
///
/// `bound -> invoking` when a broadcast frame checks the binding out,
/// `bound / invoking -> tombstone` on removal or observed expiry,
/// tombstones are reclaimed by compaction once no broadcast is on the stack.
enum Slot<Args> {
    Bound(DelegateBinding<Args>),
    /// Binding checked out by a broadcast frame. Identity is kept here so
    /// `remove` / `remove_all_for` can still match the slot.
    Invoking {
        handle: DelegateHandle,
        target: Option<usize>,
    },
    Tombstone,
}

impl<Args: 'static> Slot<Args> {
    fn handle(&self) -> Option<DelegateHandle> {
        match self {
            Self::Bound(binding) => Some(binding.handle()),
            Self::Invoking { handle, .. } => Some(*handle),
            Self::Tombstone => None,
        }
    }

    fn target(&self) -> Option<usize> {
        match self {
            Self::Bound(binding) => binding.target_addr(),
            Self::Invoking { target, .. } => *target,
            Self::Tombstone => None,
        }
    }
}

/// An ordered list of bindings invoked together.
///
/// `broadcast` iterates the list in *reverse* addition order, skipping and
/// tombstoning bindings whose lifetime target has expired. The list is
/// re-entrancy safe: a binding may `add`, `remove`, `clear` or even
/// `broadcast` on the delegate that is invoking it. A binding added during a
/// broadcast is not invoked by that broadcast; one removed during a
/// broadcast is never invoked afterwards, and is destroyed before the
/// outermost `broadcast` returns.
///
/// Not internally synchronized: share a single instance between threads
/// under an external lock, per the usual `!Sync` rules.
pub struct MulticastDelegate<Args> {
    slots: RefCell<SmallVec<[Slot<Args>; 4]>>,
    /// Broadcast nesting depth; compaction only runs at zero.
    depth: Cell<u32>,
    tombstones: Cell<u32>,
}

impl<Args: 'static> MulticastDelegate<Args> {
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(SmallVec::new()),
            depth: Cell::new(0),
            tombstones: Cell::new(0),
        }
    }

    /// Appends `binding` to the list and returns its handle.
    ///
    /// During a broadcast the new binding lands behind the iteration cursor
    /// and is first invoked by the next broadcast.
    pub fn add(&self, binding: DelegateBinding<Args>) -> DelegateHandle {
        let handle = binding.handle();
        self.slots.borrow_mut().push(Slot::Bound(binding));
        handle
    }

    /// Removes the binding with the given handle. `false` if no binding in
    /// the list has it.
    pub fn remove(&self, handle: DelegateHandle) -> bool {
        let mut slots = self.slots.borrow_mut();
        let Some(index) = slots.iter().position(|slot| slot.handle() == Some(handle)) else {
            return false;
        };

        self.bury(&mut slots[index]);
        drop(slots);

        self.compact_if_idle();
        true
    }

    /// Removes every binding whose target is the allocation behind `target`,
    /// returning how many were removed.
    pub fn remove_all_for<T>(&self, target: &Arc<T>) -> usize {
        let addr = arc_addr(target);
        let mut removed = 0;

        let mut slots = self.slots.borrow_mut();
        for slot in slots.iter_mut() {
            if slot.target() == Some(addr) {
                self.bury(slot);
                removed += 1;
            }
        }
        drop(slots);

        self.compact_if_idle();
        removed
    }

    /// Removes all bindings.
    pub fn clear(&self) {
        let mut slots = self.slots.borrow_mut();
        for slot in slots.iter_mut() {
            if slot.handle().is_some() {
                self.bury(slot);
            }
        }
        drop(slots);

        self.compact_if_idle();
    }

    /// Number of live (non-tombstoned) bindings.
    pub fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.handle().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every live binding, newest first.
    ///
    /// Bindings observed expired are tombstoned and destroyed before the
    /// outermost broadcast returns. `Args` is cloned per binding.
    pub fn broadcast(&self, args: Args)
    where
        Args: Clone,
    {
        self.depth.set(self.depth.get() + 1);
        let frame = BroadcastFrame(self);

        // Bindings added mid-broadcast land at indices >= the starting
        // length; reverse iteration never reaches them. Tombstoning is the
        // only mid-broadcast removal, so indices below the cursor are stable.
        let mut index = self.slots.borrow().len();
        while index > 0 {
            index -= 1;
            self.invoke_slot(index, args.clone());
        }

        drop(frame);
    }

    /// Checks the binding at `index` out of its slot, invokes it with no
    /// borrow held (the binding may re-enter this delegate), and settles the
    /// slot afterwards - through a drop guard, so a panicking binding cannot
    /// leave the slot checked out.
    fn invoke_slot(&self, index: usize, args: Args) {
        let binding = {
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[index];
            match slot {
                Slot::Bound(binding) => {
                    let placeholder = Slot::Invoking {
                        handle: binding.handle(),
                        target: binding.target_addr(),
                    };
                    let Slot::Bound(binding) = mem::replace(slot, placeholder) else {
                        unreachable!()
                    };
                    binding
                }
                // Tombstoned, or checked out by an outer broadcast frame.
                _ => return,
            }
        };

        let mut guard = SettleSlot {
            list: self,
            index,
            binding: Some(binding),
            lived: false,
        };
        guard.lived = guard
            .binding
            .as_mut()
            .map_or(false, |binding| binding.invoke_if_safe(args).is_some());
    }

    /// Turns a live slot into a tombstone.
    fn bury(&self, slot: &mut Slot<Args>) {
        debug_assert!(slot.handle().is_some());
        *slot = Slot::Tombstone;
        self.tombstones.set(self.tombstones.get() + 1);
    }

    /// Swap-with-last removal of all tombstones; deferred while any
    /// broadcast frame is on the stack.
    fn compact_if_idle(&self) {
        if self.depth.get() != 0 || self.tombstones.get() == 0 {
            return;
        }

        let mut slots = self.slots.borrow_mut();
        let mut index = 0;
        while index < slots.len() {
            if matches!(slots[index], Slot::Tombstone) {
                slots.swap_remove(index);
            } else {
                index += 1;
            }
        }
        self.tombstones.set(0);
    }
}

/// Returns a checked-out binding to its slot on drop.
///
/// Runs on unwind too: a binding that panicked is treated like one that
/// expired and leaves a tombstone behind, keeping the list consistent.
struct SettleSlot<'a, Args: 'static> {
    list: &'a MulticastDelegate<Args>,
    index: usize,
    binding: Option<DelegateBinding<Args>>,
    lived: bool,
}

impl<Args: 'static> Drop for SettleSlot<'_, Args> {
    fn drop(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };

        let mut slots = self.list.slots.borrow_mut();
        match mem::replace(&mut slots[self.index], Slot::Tombstone) {
            Slot::Invoking { .. } if self.lived => slots[self.index] = Slot::Bound(binding),
            // Observed expired (or panicked): the slot stays a tombstone.
            Slot::Invoking { .. } => self.list.tombstones.set(self.list.tombstones.get() + 1),
            // Removed re-entrantly while checked out (already counted); the
            // binding is destroyed here, inside the broadcast.
            Slot::Tombstone => drop(binding),
            Slot::Bound(_) => unreachable!("slot rebound while its binding was checked out"),
        }
    }
}

/// Unwinds one level of broadcast nesting on drop, so a panicking binding
/// cannot leave the depth counter stuck and compaction disabled.
struct BroadcastFrame<'a, Args: 'static>(&'a MulticastDelegate<Args>);

impl<Args: 'static> Drop for BroadcastFrame<'_, Args> {
    fn drop(&mut self) {
        self.0.depth.set(self.0.depth.get() - 1);
        self.0.compact_if_idle();
    }
}

impl<Args: 'static> Default for MulticastDelegate<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Debug for MulticastDelegate<Args> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastDelegate")
            .field("len", &self.len())
            .field("depth", &self.depth.get())
            .field("tombstones", &self.tombstones.get())
            .finish()
    }
}
