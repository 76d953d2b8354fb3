//! Delegate dispatch: lifetime-checked callable slots.
//!
//! A [`DelegateBinding`] packages a callable with a lifetime contract: free
//! functions and owned functors are always invocable, while bindings over a
//! weakly-held target expire when the target's last strong reference drops.
//! [`Delegate`] holds one binding; [`MulticastDelegate`] an ordered list
//! invoked newest-first, with bindings safely removable mid-broadcast.
//!
//! Delegates are not internally synchronized; see the per-type docs.

mod binding;
mod multicast;
mod unicast;

pub use {
    binding::{DelegateBinding, DelegateHandle, ReflectTarget},
    multicast::MulticastDelegate,
    unicast::Delegate,
};
