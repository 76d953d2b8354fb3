//! Delegate bindings: a stored callable plus its lifetime contract.

use {
    crate::{error::Error, name::Name},
    std::{
        any::Any,
        collections::hash_map::RandomState,
        fmt::{self, Debug, Formatter},
        hash::{BuildHasher, Hasher},
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, OnceLock, Weak,
        },
    },
};

/// Process-unique id of one binding.
///
/// The low half is a monotonic counter, the high half a per-process random
/// value, so handles from a previous run (or a different process) do not
/// accidentally match. The handle outlives its binding and is the key for
/// [`MulticastDelegate::remove`](crate::MulticastDelegate::remove).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DelegateHandle(u64);

impl DelegateHandle {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        static SEED: OnceLock<u64> = OnceLock::new();

        let seed = *SEED.get_or_init(|| {
            let mut hasher = RandomState::new().build_hasher();
            hasher.write_u64(std::process::id() as u64);
            hasher.finish() << 32
        });

        Self(seed | (COUNTER.fetch_add(1, Ordering::Relaxed) & 0xffff_ffff))
    }

    /// The raw 64-bit value, for logging and diagnostics.
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// A target that can be invoked by method name.
///
/// The seam for reflected dispatch: a binding created by
/// [`DelegateBinding::from_reflected`] resolves the bound [`Name`] through
/// this trait on every invocation, so the target decides (and may change)
/// what the name maps to.
pub trait ReflectTarget<Args, R = ()> {
    /// Invokes the method `method` names. `None` if the target does not
    /// recognize it.
    fn dispatch(&self, method: Name, args: Args) -> Option<R>;
}

/// Type-erased liveness probe shared by all weak-target variants.
type Probe = Weak<dyn Any>;

enum BindingKind<Args, R> {
    /// Free function. Always safe.
    Function(fn(Args) -> R),
    /// Owned functor. Always safe.
    Functor(Box<dyn FnMut(Args) -> R>),
    /// Method over a weakly-held target; `call` upgrades per invocation and
    /// holds the strong reference for the duration of the call.
    Method {
        probe: Probe,
        call: Box<dyn FnMut(Args) -> Option<R>>,
    },
    /// Functor guarded by a weak context it does not otherwise use.
    WeakFunctor {
        context: Probe,
        call: Box<dyn FnMut(Args) -> R>,
    },
    /// Method-by-name over a weakly-held reflected target.
    ReflectedMethod {
        target: Weak<dyn ReflectTarget<Args, R>>,
        method: Name,
    },
}

/// One stored callable with a lifetime contract and a stable handle.
///
/// Created by the `from_*` factories, owned by a [`Delegate`](crate::Delegate)
/// slot or a [`MulticastDelegate`](crate::MulticastDelegate) list entry.
pub struct DelegateBinding<Args, R = ()> {
    handle: DelegateHandle,
    kind: BindingKind<Args, R>,
}

impl<Args: 'static, R: 'static> DelegateBinding<Args, R> {
    /// Binds a free function.
    pub fn from_function(function: fn(Args) -> R) -> Self {
        Self {
            handle: DelegateHandle::next(),
            kind: BindingKind::Function(function),
        }
    }

    /// Binds an owned functor (closure); the binding owns it outright, so it
    /// is always safe to invoke.
    pub fn from_functor<F>(functor: F) -> Self
    where
        F: FnMut(Args) -> R + 'static,
    {
        Self {
            handle: DelegateHandle::next(),
            kind: BindingKind::Functor(Box::new(functor)),
        }
    }

    /// Binds a method over a shared-ownership target. The binding holds the
    /// target weakly; it expires when the last strong reference drops.
    pub fn from_shared_method<T>(target: &Arc<T>, method: fn(&T, Args) -> R) -> Self
    where
        T: 'static,
    {
        Self::from_weak_method(&Arc::downgrade(target), method)
    }

    /// [`from_shared_method`](Self::from_shared_method) starting from an
    /// already-weak reference.
    pub fn from_weak_method<T>(target: &Weak<T>, method: fn(&T, Args) -> R) -> Self
    where
        T: 'static,
    {
        let weak = target.clone();
        let probe: Probe = target.clone();
        Self {
            handle: DelegateHandle::next(),
            kind: BindingKind::Method {
                probe,
                call: Box::new(move |args| {
                    // The upgraded Arc pins the target for the whole call.
                    weak.upgrade().map(|strong| method(&strong, args))
                }),
            },
        }
    }

    /// Binds a functor whose validity is tied to `context`: the functor runs
    /// only while `context` still has strong references.
    pub fn from_weak_functor<C, F>(context: &Arc<C>, functor: F) -> Self
    where
        C: 'static,
        F: FnMut(Args) -> R + 'static,
    {
        // Downgrade first; the unsized coercion to `Probe` is its own step.
        let weak = Arc::downgrade(context);
        let context: Probe = weak;
        Self {
            handle: DelegateHandle::next(),
            kind: BindingKind::WeakFunctor {
                context,
                call: Box::new(functor),
            },
        }
    }

    /// Binds a method by name on a reflected target; the name is resolved
    /// through [`ReflectTarget::dispatch`] on every invocation.
    pub fn from_reflected<T>(target: &Arc<T>, method: Name) -> Self
    where
        T: ReflectTarget<Args, R> + 'static,
    {
        let weak = Arc::downgrade(target);
        let target: Weak<dyn ReflectTarget<Args, R>> = weak;
        Self {
            handle: DelegateHandle::next(),
            kind: BindingKind::ReflectedMethod { target, method },
        }
    }

    /// The binding's process-unique id.
    #[inline]
    pub fn handle(&self) -> DelegateHandle {
        self.handle
    }

    /// Whether [`invoke`](Self::invoke) would currently find a live target.
    ///
    /// A `true` is advisory under concurrency: the target may expire between
    /// this check and the call. [`invoke_if_safe`](Self::invoke_if_safe)
    /// performs the check and the upgrade as one step.
    pub fn is_safe_to_invoke(&self) -> bool {
        match &self.kind {
            BindingKind::Function(_) | BindingKind::Functor(_) => true,
            BindingKind::Method { probe, .. } => probe.strong_count() > 0,
            BindingKind::WeakFunctor { context, .. } => context.strong_count() > 0,
            BindingKind::ReflectedMethod { target, .. } => target.strong_count() > 0,
        }
    }

    /// Invokes the callable.
    ///
    /// # Errors
    ///
    /// [`Error::BindingExpired`] if the weak target is gone, or if a
    /// reflected target no longer recognizes the bound method name.
    pub fn invoke(&mut self, args: Args) -> Result<R, Error> {
        match &mut self.kind {
            BindingKind::Function(function) => Ok(function(args)),
            BindingKind::Functor(functor) => Ok(functor(args)),
            BindingKind::Method { call, .. } => call(args).ok_or(Error::BindingExpired),
            BindingKind::WeakFunctor { context, call } => {
                // Pin the context across the call.
                let guard = context.upgrade().ok_or(Error::BindingExpired)?;
                let result = call(args);
                drop(guard);
                Ok(result)
            }
            BindingKind::ReflectedMethod { target, method } => target
                .upgrade()
                .and_then(|strong| strong.dispatch(*method, args))
                .ok_or(Error::BindingExpired),
        }
    }

    /// Invokes only if the target is live; `None` otherwise.
    pub fn invoke_if_safe(&mut self, args: Args) -> Option<R> {
        self.invoke(args).ok()
    }

    /// Address identifying the bound target's allocation, for
    /// [`remove_all_for`](crate::MulticastDelegate::remove_all_for).
    /// `None` for target-less variants.
    pub fn target_addr(&self) -> Option<usize> {
        match &self.kind {
            BindingKind::Function(_) | BindingKind::Functor(_) => None,
            BindingKind::Method { probe, .. } => Some(probe.as_ptr() as *const () as usize),
            BindingKind::WeakFunctor { context, .. } => {
                Some(context.as_ptr() as *const () as usize)
            }
            BindingKind::ReflectedMethod { target, .. } => {
                Some(target.as_ptr() as *const () as usize)
            }
        }
    }
}

impl<Args, R> Debug for DelegateBinding<Args, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            BindingKind::Function(_) => "function",
            BindingKind::Functor(_) => "functor",
            BindingKind::Method { .. } => "method",
            BindingKind::WeakFunctor { .. } => "weak functor",
            BindingKind::ReflectedMethod { .. } => "reflected method",
        };
        write!(f, "DelegateBinding({kind}, handle: {:#x})", self.handle.0)
    }
}

/// Address of an `Arc`'s allocation in the form [`DelegateBinding::target_addr`]
/// reports it.
pub(crate) fn arc_addr<T>(target: &Arc<T>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = DelegateBinding::<(), ()>::from_function(|()| ());
        let b = DelegateBinding::<(), ()>::from_function(|()| ());
        assert_ne!(a.handle(), b.handle());
    }

    #[test]
    fn function_and_functor_are_always_safe() {
        fn double(x: i32) -> i32 {
            x * 2
        }

        let mut function = DelegateBinding::from_function(double);
        assert!(function.is_safe_to_invoke());
        assert_eq!(function.invoke(21).unwrap(), 42);

        let mut total = 0;
        let mut functor = DelegateBinding::from_functor(move |x: i32| {
            total += x;
            total
        });
        assert_eq!(functor.invoke(1).unwrap(), 1);
        assert_eq!(functor.invoke(2).unwrap(), 3);
    }

    #[test]
    fn shared_method_expires_with_its_target() {
        struct Counter(std::sync::atomic::AtomicU32);
        impl Counter {
            fn bump(&self, by: u32) -> u32 {
                self.0.fetch_add(by, Ordering::Relaxed) + by
            }
        }

        let target = Arc::new(Counter(std::sync::atomic::AtomicU32::new(0)));
        let mut binding =
            DelegateBinding::from_shared_method(&target, |counter, by| counter.bump(by));

        assert!(binding.is_safe_to_invoke());
        assert_eq!(binding.invoke(5).unwrap(), 5);
        assert_eq!(binding.target_addr(), Some(arc_addr(&target)));

        drop(target);
        assert!(!binding.is_safe_to_invoke());
        assert_eq!(binding.invoke(5), Err(Error::BindingExpired));
        assert_eq!(binding.invoke_if_safe(5), None);
    }

    #[test]
    fn weak_functor_is_guarded_by_its_context() {
        let context = Arc::new(());
        let mut calls = 0;
        let mut binding = DelegateBinding::from_weak_functor(&context, move |()| {
            calls += 1;
            calls
        });

        assert_eq!(binding.invoke_if_safe(()), Some(1));
        drop(context);
        assert_eq!(binding.invoke_if_safe(()), None);
        assert!(!binding.is_safe_to_invoke());
    }

    #[test]
    fn reflected_method_dispatches_by_name() {
        struct Soundboard;
        impl ReflectTarget<i32, String> for Soundboard {
            fn dispatch(&self, method: Name, volume: i32) -> Option<String> {
                if method == Name::new("Play").unwrap() {
                    Some(format!("playing at {volume}"))
                } else {
                    None
                }
            }
        }

        let target = Arc::new(Soundboard);
        let play = Name::new("Play").unwrap();
        let stop = Name::new("Stop").unwrap();

        let mut bound = DelegateBinding::from_reflected(&target, play);
        assert_eq!(bound.invoke(7).unwrap(), "playing at 7");

        // An unrecognized name yields no result.
        let mut unknown = DelegateBinding::from_reflected(&target, stop);
        assert_eq!(unknown.invoke(7), Err(Error::BindingExpired));

        drop(target);
        assert_eq!(bound.invoke(7), Err(Error::BindingExpired));
    }
}
