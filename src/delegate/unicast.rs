//! Single-binding delegate slot.

use {
    crate::{
        delegate::binding::{DelegateBinding, DelegateHandle, ReflectTarget},
        error::Error,
        name::Name,
    },
    std::sync::{Arc, Weak},
};

/// A delegate slot holding at most one binding.
///
/// `Args` is the argument tuple passed to the callable, `R` its return type.
/// Binding replaces any previous binding; the old one is destroyed.
///
/// Not internally synchronized - a single instance needs external mutual
/// exclusion, like any `&mut`-based API.
///
/// ```
/// # use namepool::Delegate;
/// let mut on_damage = Delegate::<(u32, bool), u32>::new();
/// on_damage.bind_function(|(amount, critical)| if critical { amount * 2 } else { amount });
///
/// assert_eq!(on_damage.invoke((10, true)).unwrap(), 20);
/// ```
pub struct Delegate<Args, R = ()> {
    binding: Option<DelegateBinding<Args, R>>,
}

impl<Args: 'static, R: 'static> Delegate<Args, R> {
    /// An unbound slot.
    pub fn new() -> Self {
        Self { binding: None }
    }

    /// Installs `binding`, replacing and destroying any previous one.
    pub fn bind(&mut self, binding: DelegateBinding<Args, R>) -> DelegateHandle {
        let handle = binding.handle();
        self.binding = Some(binding);
        handle
    }

    pub fn bind_function(&mut self, function: fn(Args) -> R) -> DelegateHandle {
        self.bind(DelegateBinding::from_function(function))
    }

    pub fn bind_functor<F>(&mut self, functor: F) -> DelegateHandle
    where
        F: FnMut(Args) -> R + 'static,
    {
        self.bind(DelegateBinding::from_functor(functor))
    }

    pub fn bind_shared_method<T>(
        &mut self,
        target: &Arc<T>,
        method: fn(&T, Args) -> R,
    ) -> DelegateHandle
    where
        T: 'static,
    {
        self.bind(DelegateBinding::from_shared_method(target, method))
    }

    pub fn bind_weak_method<T>(
        &mut self,
        target: &Weak<T>,
        method: fn(&T, Args) -> R,
    ) -> DelegateHandle
    where
        T: 'static,
    {
        self.bind(DelegateBinding::from_weak_method(target, method))
    }

    pub fn bind_weak_functor<C, F>(&mut self, context: &Arc<C>, functor: F) -> DelegateHandle
    where
        C: 'static,
        F: FnMut(Args) -> R + 'static,
    {
        self.bind(DelegateBinding::from_weak_functor(context, functor))
    }

    pub fn bind_reflected<T>(&mut self, target: &Arc<T>, method: Name) -> DelegateHandle
    where
        T: ReflectTarget<Args, R> + 'static,
    {
        self.bind(DelegateBinding::from_reflected(target, method))
    }

    /// Removes and destroys the binding. `false` if the slot was empty.
    pub fn unbind(&mut self) -> bool {
        self.binding.take().is_some()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Handle of the current binding, if any.
    pub fn handle(&self) -> Option<DelegateHandle> {
        self.binding.as_ref().map(|binding| binding.handle())
    }

    /// Whether an invoke would find a bound, live target.
    pub fn is_safe_to_invoke(&self) -> bool {
        self.binding
            .as_ref()
            .map_or(false, |binding| binding.is_safe_to_invoke())
    }

    /// Invokes the binding.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`] when the slot is empty,
    /// [`Error::BindingExpired`] when the binding's target is gone.
    pub fn invoke(&mut self, args: Args) -> Result<R, Error> {
        self.binding
            .as_mut()
            .ok_or(Error::Unbound)?
            .invoke(args)
    }

    /// Invokes only if bound and live; `None` otherwise.
    pub fn invoke_if_safe(&mut self, args: Args) -> Option<R> {
        self.binding.as_mut()?.invoke_if_safe(args)
    }
}

impl<Args: 'static, R: 'static> Default for Delegate<Args, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_slot() {
        let mut slot = Delegate::<i32, i32>::new();

        assert!(!slot.is_bound());
        assert!(!slot.is_safe_to_invoke());
        assert_eq!(slot.handle(), None);
        assert_eq!(slot.invoke(1), Err(Error::Unbound));
        assert_eq!(slot.invoke_if_safe(1), None);
        assert!(!slot.unbind());
    }

    #[test]
    fn rebinding_replaces() {
        let mut slot = Delegate::<(), i32>::new();

        let first = slot.bind_function(|()| 1);
        assert_eq!(slot.invoke(()).unwrap(), 1);

        let second = slot.bind_function(|()| 2);
        assert_ne!(first, second);
        assert_eq!(slot.handle(), Some(second));
        assert_eq!(slot.invoke(()).unwrap(), 2);

        assert!(slot.unbind());
        assert_eq!(slot.invoke(()), Err(Error::Unbound));
    }

    #[test]
    fn bound_method_follows_target_lifetime() {
        struct Widget {
            scale: i32,
        }

        let widget = Arc::new(Widget { scale: 3 });
        let mut slot = Delegate::<i32, i32>::new();
        slot.bind_shared_method(&widget, |widget, x| widget.scale * x);

        assert_eq!(slot.invoke(7).unwrap(), 21);

        drop(widget);
        assert!(slot.is_bound()); // still bound, no longer safe
        assert!(!slot.is_safe_to_invoke());
        assert_eq!(slot.invoke(7), Err(Error::BindingExpired));
        assert_eq!(slot.invoke_if_safe(7), None);
    }

    #[test]
    fn functor_captures_state() {
        let mut slot = Delegate::<i32, i32>::new();
        let mut sum = 0;
        slot.bind_functor(move |x| {
            sum += x;
            sum
        });

        assert_eq!(slot.invoke(2).unwrap(), 2);
        assert_eq!(slot.invoke(3).unwrap(), 5);
    }
}
