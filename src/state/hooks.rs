//! Hooks - per-instance state slots, context reads and deferred reads.
//!
//! Each component instance owns an ordered list of slots. Slots are identified
//! by call order: the n-th `use_state` call on every render of an instance
//! reads the n-th slot. The list is handed to the [`Scope`] for the duration
//! of one render and returned to the instance afterwards.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::Deferred;
use crate::config::{RendererConfig, UpdatePolicy};
use crate::context::{Context, ContextStore};
use crate::error::{Interrupt, PendingSignal, RenderError};
use crate::types::FiberId;

// =============================================================================
// Update Queue
// =============================================================================

/// Receiver of update requests for mounted instances.
///
/// Implemented by the renderer runtime; setters and instance handles hold it
/// weakly so they never keep a renderer alive.
pub(crate) trait UpdateQueue {
    fn request_update(&self, instance: FiberId);
}

// =============================================================================
// Slots
// =============================================================================

/// One state slot's storage, shared between the instance and its setters.
struct StateCell<T> {
    value: RefCell<T>,
}

/// A type-erased slot in an instance's slot list.
///
/// Clones share the cell, so a saved copy of a slot list sees the same values
/// as the live one.
#[derive(Clone)]
pub(crate) struct HookSlot {
    cell: Rc<dyn Any>,
    type_name: &'static str,
}

// =============================================================================
// Setter
// =============================================================================

/// Setter for one state slot.
///
/// Stores the new value and, if it differs from the current one under the
/// renderer's [`UpdatePolicy`], asks for a scheduled re-render of the owning
/// instance. Never re-renders synchronously.
pub struct Setter<T> {
    cell: Rc<StateCell<T>>,
    instance: FiberId,
    policy: UpdatePolicy,
    queue: Weak<dyn UpdateQueue>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            instance: self.instance,
            policy: self.policy,
            queue: self.queue.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setter")
            .field("instance", &self.instance)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T: PartialEq + 'static> Setter<T> {
    pub fn set(&self, value: T) {
        let changed = {
            let mut current = self.cell.value.borrow_mut();
            let changed = self.policy == UpdatePolicy::AlwaysRerender || *current != value;
            if changed {
                *current = value;
            }
            changed
        };

        if changed {
            self.request();
        } else {
            trace!(instance = %self.instance, "state unchanged, no update scheduled");
        }
    }

    /// Set the value to a function of the previous one.
    pub fn update(&self, next: impl FnOnce(&T) -> T) {
        let value = next(&self.cell.value.borrow());
        self.set(value);
    }

    fn request(&self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.request_update(self.instance);
        }
    }
}

impl<T: Clone> Setter<T> {
    /// Current stored value (may be ahead of what the last render saw).
    pub fn get(&self) -> T {
        self.cell.value.borrow().clone()
    }
}

// =============================================================================
// Instance Handle
// =============================================================================

/// Weak handle to a mounted component instance.
#[derive(Clone)]
pub struct InstanceHandle {
    id: FiberId,
    queue: Weak<dyn UpdateQueue>,
}

impl InstanceHandle {
    pub fn id(&self) -> FiberId {
        self.id
    }

    /// Schedule a re-render of this instance on the next flush.
    pub fn request_update(&self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.request_update(self.id);
        }
    }
}

impl std::fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceHandle").field("id", &self.id).finish()
    }
}

// =============================================================================
// Scope
// =============================================================================

/// Render-time access to an instance's hooks and the context in effect.
///
/// A `Scope` only exists while its component body runs.
pub struct Scope<'a> {
    instance: FiberId,
    component: &'static str,
    slots: &'a mut Vec<HookSlot>,
    cursor: usize,
    completed: bool,
    config: &'a RendererConfig,
    context: &'a ContextStore,
    queue: &'a Weak<dyn UpdateQueue>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        instance: FiberId,
        component: &'static str,
        slots: &'a mut Vec<HookSlot>,
        completed: bool,
        config: &'a RendererConfig,
        context: &'a ContextStore,
        queue: &'a Weak<dyn UpdateQueue>,
    ) -> Self {
        Self {
            instance,
            component,
            slots,
            cursor: 0,
            completed,
            config,
            context,
            queue,
        }
    }

    /// Handle to this instance, usable after the render returns.
    pub fn instance(&self) -> InstanceHandle {
        InstanceHandle {
            id: self.instance,
            queue: self.queue.clone(),
        }
    }

    /// Number of slots read so far in this render.
    pub(crate) fn slots_read(&self) -> usize {
        self.cursor
    }

    /// Declare a state slot.
    ///
    /// The first render stores `init()`; later renders return the stored
    /// value and ignore `init`.
    pub fn use_state<T, F>(&mut self, init: F) -> Result<(T, Setter<T>), RenderError>
    where
        T: Clone + PartialEq + 'static,
        F: FnOnce() -> T,
    {
        let index = self.cursor;
        self.cursor += 1;

        let cell = match self.slots.get(index) {
            Some(slot) => match slot.cell.clone().downcast::<StateCell<T>>() {
                Ok(cell) => cell,
                Err(_) if self.config.strict_hooks => {
                    return Err(RenderError::HookMismatch {
                        component: self.component,
                        slot: index,
                        expected: slot.type_name,
                        found: type_name::<T>(),
                    });
                }
                Err(_) => {
                    warn!(
                        component = self.component,
                        slot = index,
                        "hook slot changed type, resetting it"
                    );
                    let cell = new_cell(init());
                    self.slots[index] = slot_for(&cell);
                    cell
                }
            },
            None => {
                if self.completed && self.config.strict_hooks {
                    return Err(RenderError::HookCount {
                        component: self.component,
                        expected: self.slots.len(),
                        found: index + 1,
                    });
                }
                let cell = new_cell(init());
                self.slots.push(slot_for(&cell));
                cell
            }
        };

        let value = cell.value.borrow().clone();
        let setter = Setter {
            cell,
            instance: self.instance,
            policy: self.config.update_policy,
            queue: self.queue.clone(),
        };
        Ok((value, setter))
    }

    /// Nearest value published for `context` above this instance.
    pub fn use_context<T: Clone + 'static>(&self, context: &Context<T>) -> T {
        self.context.read(context)
    }

    /// Settled value of `deferred`, or a suspension the nearest boundary
    /// will wait on.
    pub fn use_deferred<T: Clone + 'static>(&self, deferred: &Deferred<T>) -> Result<T, Interrupt> {
        match deferred.peek() {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(error.into()),
            None => {
                trace!(component = self.component, "suspending on unsettled value");
                Err(PendingSignal::new(self.component, deferred.settled()).into())
            }
        }
    }

    /// A failure of this component, to be returned from its body.
    pub fn fail(&self, message: impl Into<String>) -> Interrupt {
        RenderError::Thrown {
            component: self.component,
            message: message.into(),
        }
        .into()
    }
}

fn new_cell<T>(value: T) -> Rc<StateCell<T>> {
    Rc::new(StateCell {
        value: RefCell::new(value),
    })
}

fn slot_for<T: 'static>(cell: &Rc<StateCell<T>>) -> HookSlot {
    HookSlot {
        cell: cell.clone(),
        type_name: type_name::<T>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::create_context;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingQueue {
        requests: RefCell<Vec<FiberId>>,
    }

    impl UpdateQueue for CountingQueue {
        fn request_update(&self, instance: FiberId) {
            self.requests.borrow_mut().push(instance);
        }
    }

    fn detached_queue() -> Weak<dyn UpdateQueue> {
        Weak::<CountingQueue>::new()
    }

    struct Harness {
        slots: Vec<HookSlot>,
        config: RendererConfig,
        store: ContextStore,
        queue: Rc<CountingQueue>,
        weak: Weak<dyn UpdateQueue>,
    }

    impl Harness {
        fn new(config: RendererConfig) -> Self {
            let queue = Rc::new(CountingQueue::default());
            let weak: Weak<dyn UpdateQueue> = Rc::downgrade(&queue) as Weak<dyn UpdateQueue>;
            Self {
                slots: Vec::new(),
                config,
                store: ContextStore::new(),
                queue,
                weak,
            }
        }

        fn scope(&mut self, completed: bool) -> Scope<'_> {
            Scope::new(
                FiberId(1),
                "tests::component",
                &mut self.slots,
                completed,
                &self.config,
                &self.store,
                &self.weak,
            )
        }
    }

    #[test]
    fn test_state_persists_across_renders() {
        let mut harness = Harness::new(RendererConfig::default());
        let inits = Cell::new(0);

        let (value, setter) = {
            let mut cx = harness.scope(false);
            cx.use_state(|| {
                inits.set(inits.get() + 1);
                10
            })
            .unwrap()
        };
        assert_eq!(value, 10);

        setter.set(11);

        let mut cx = harness.scope(true);
        let (value, _) = cx.use_state(|| 99).unwrap();
        assert_eq!(value, 11);
        assert_eq!(inits.get(), 1);
    }

    #[test]
    fn test_setter_skips_equal_values() {
        let mut harness = Harness::new(RendererConfig::default());
        let (_, setter) = harness.scope(false).use_state(|| 1).unwrap();

        setter.set(1);
        assert!(harness.queue.requests.borrow().is_empty());

        setter.update(|prev| prev + 1);
        assert_eq!(*harness.queue.requests.borrow(), vec![FiberId(1)]);
        assert_eq!(setter.get(), 2);
    }

    #[test]
    fn test_always_rerender_policy() {
        let config = RendererConfig::default().update_policy(UpdatePolicy::AlwaysRerender);
        let mut harness = Harness::new(config);
        let (_, setter) = harness.scope(false).use_state(|| 1).unwrap();

        setter.set(1);
        assert_eq!(harness.queue.requests.borrow().len(), 1);
    }

    #[test]
    fn test_hook_type_mismatch_fails_fast() {
        let mut harness = Harness::new(RendererConfig::default());
        harness.scope(false).use_state(|| 1).unwrap();

        let err = harness.scope(true).use_state(|| "text").unwrap_err();
        assert!(matches!(err, RenderError::HookMismatch { slot: 0, .. }));
    }

    #[test]
    fn test_extra_hook_after_completed_render_fails() {
        let mut harness = Harness::new(RendererConfig::default());
        harness.scope(false).use_state(|| 1).unwrap();

        let mut cx = harness.scope(true);
        cx.use_state(|| 1).unwrap();
        let err = cx.use_state(|| 2).unwrap_err();
        assert!(matches!(err, RenderError::HookCount { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_lenient_hooks_reset_slot() {
        let config = RendererConfig::default().strict_hooks(false);
        let mut harness = Harness::new(config);
        harness.scope(false).use_state(|| 1).unwrap();

        let (value, _) = harness.scope(true).use_state(|| "fresh").unwrap();
        assert_eq!(value, "fresh");
    }

    #[test]
    fn test_use_context_reads_store() {
        let ctx = create_context(0);
        let mut harness = Harness::new(RendererConfig::default());
        let frame = harness.store.push_provider(ctx.id(), Rc::new(4));

        assert_eq!(harness.scope(false).use_context(&ctx), 4);
        harness.store.pop(frame).unwrap();
    }

    #[test]
    fn test_use_deferred_suspends_until_observed() {
        let mut harness = Harness::new(RendererConfig::default());
        let deferred = Deferred::ready(5);

        let cx = harness.scope(false);
        match cx.use_deferred(&deferred) {
            Err(Interrupt::Suspend(signal)) => {
                assert_eq!(signal.component(), "tests::component");
                futures::executor::block_on(signal.dependency).unwrap();
            }
            other => panic!("expected suspension, got {other:?}"),
        }
        assert_eq!(cx.use_deferred(&deferred).unwrap(), 5);
    }

    #[test]
    fn test_setter_after_renderer_dropped_is_noop() {
        let mut slots = Vec::new();
        let config = RendererConfig::default();
        let store = ContextStore::new();
        let queue = detached_queue();
        let mut cx = Scope::new(FiberId(9), "orphan", &mut slots, false, &config, &store, &queue);

        let (_, setter) = cx.use_state(|| 0).unwrap();
        setter.set(1);
        assert_eq!(setter.get(), 1);
        assert_eq!(cx.slots_read(), 1);
    }
}
