use {
    namepool::{Delegate, DelegateBinding, Error, MulticastDelegate, Name, ReflectTarget},
    std::{
        cell::RefCell,
        rc::Rc,
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc,
        },
    },
};

struct HitCounter {
    hits: AtomicU32,
}

impl HitCounter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            hits: AtomicU32::new(0),
        })
    }

    fn on_hit(&self, damage: u32) {
        self.hits.fetch_add(damage, Ordering::Relaxed);
    }

    fn hits(&self) -> u32 {
        self.hits.load(Ordering::Relaxed)
    }
}

#[test]
fn multicast_drops_expired_listeners() {
    let delegate = MulticastDelegate::<u32>::new();
    let counter = HitCounter::new();

    delegate.add(DelegateBinding::from_shared_method(&counter, |counter, damage| {
        counter.on_hit(damage)
    }));
    assert_eq!(delegate.len(), 1);

    delegate.broadcast(5);
    assert_eq!(counter.hits(), 5);

    // Keep a weak reference to observe the binding releasing its target.
    let weak = Arc::downgrade(&counter);
    drop(counter);
    assert_eq!(weak.strong_count(), 0, "binding must not keep the target alive");

    delegate.broadcast(5);
    assert_eq!(delegate.len(), 0, "expired binding must be removed");
}

#[test]
fn broadcast_is_newest_first_and_stable() {
    let delegate = MulticastDelegate::<()>::new();
    let order: Rc<RefCell<Vec<u32>>> = Rc::default();

    for tag in 1..=3 {
        let order = order.clone();
        delegate.add(DelegateBinding::from_functor(move |()| {
            order.borrow_mut().push(tag)
        }));
    }

    delegate.broadcast(());
    delegate.broadcast(());
    assert_eq!(*order.borrow(), [3, 2, 1, 3, 2, 1]);
}

#[test]
fn handler_added_during_broadcast_runs_next_time() {
    let delegate = Rc::new(MulticastDelegate::<()>::new());
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();

    let h1_order = order.clone();
    let h1_delegate = delegate.clone();
    let added = RefCell::new(false);
    delegate.add(DelegateBinding::from_functor(move |()| {
        h1_order.borrow_mut().push("h1");
        if !*added.borrow() {
            *added.borrow_mut() = true;
            let order = h1_order.clone();
            h1_delegate.add(DelegateBinding::from_functor(move |()| {
                order.borrow_mut().push("h2")
            }));
        }
    }));

    delegate.broadcast(());
    assert_eq!(*order.borrow(), ["h1"]);

    delegate.broadcast(());
    assert_eq!(*order.borrow(), ["h1", "h2", "h1"]);
}

#[test]
fn removal_during_broadcast_takes_effect_immediately() {
    let delegate = Rc::new(MulticastDelegate::<()>::new());
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();

    let victim_order = order.clone();
    let victim = delegate.add(DelegateBinding::from_functor(move |()| {
        victim_order.borrow_mut().push("victim")
    }));

    // Added later, so it runs first and removes "victim" before the cursor
    // reaches it.
    let killer_delegate = delegate.clone();
    let killer_order = order.clone();
    delegate.add(DelegateBinding::from_functor(move |()| {
        killer_order.borrow_mut().push("killer");
        assert!(killer_delegate.remove(victim));
    }));

    delegate.broadcast(());
    assert_eq!(*order.borrow(), ["killer"]);
    assert_eq!(delegate.len(), 1);
}

#[test]
fn remove_all_for_detaches_one_listener() {
    let delegate = MulticastDelegate::<u32>::new();
    let alpha = HitCounter::new();
    let beta = HitCounter::new();

    delegate.add(DelegateBinding::from_shared_method(&alpha, |c, damage| {
        c.on_hit(damage)
    }));
    delegate.add(DelegateBinding::from_shared_method(&beta, |c, damage| {
        c.on_hit(damage)
    }));

    assert_eq!(delegate.remove_all_for(&alpha), 1);

    delegate.broadcast(3);
    assert_eq!(alpha.hits(), 0);
    assert_eq!(beta.hits(), 3);
}

#[test]
fn unicast_lifecycle() {
    let mut on_scored = Delegate::<u32, u32>::new();

    assert_eq!(on_scored.invoke(1), Err(Error::Unbound));

    let counter = HitCounter::new();
    on_scored.bind_shared_method(&counter, |counter, points| {
        counter.on_hit(points);
        counter.hits()
    });

    assert_eq!(on_scored.invoke(10).unwrap(), 10);
    assert_eq!(on_scored.invoke_if_safe(5), Some(15));

    drop(counter);
    assert!(!on_scored.is_safe_to_invoke());
    assert_eq!(on_scored.invoke(1), Err(Error::BindingExpired));

    assert!(on_scored.unbind());
    assert_eq!(on_scored.invoke(1), Err(Error::Unbound));
}

#[test]
fn reflected_dispatch_by_name() {
    struct Door {
        open: AtomicU32,
    }

    impl ReflectTarget<(), &'static str> for Door {
        fn dispatch(&self, method: Name, (): ()) -> Option<&'static str> {
            if method == Name::new("Open").unwrap() {
                self.open.store(1, Ordering::Relaxed);
                Some("opened")
            } else if method == Name::new("Close").unwrap() {
                self.open.store(0, Ordering::Relaxed);
                Some("closed")
            } else {
                None
            }
        }
    }

    let door = Arc::new(Door {
        open: AtomicU32::new(0),
    });

    let mut slot = Delegate::<(), &'static str>::new();
    slot.bind_reflected(&door, Name::new("Open").unwrap());
    assert_eq!(slot.invoke(()).unwrap(), "opened");
    assert_eq!(door.open.load(Ordering::Relaxed), 1);

    slot.bind_reflected(&door, Name::new("Jiggle").unwrap());
    assert_eq!(slot.invoke(()), Err(Error::BindingExpired));

    slot.bind_reflected(&door, Name::new("Close").unwrap());
    drop(door);
    assert_eq!(slot.invoke(()), Err(Error::BindingExpired));
    assert_eq!(slot.invoke_if_safe(()), None);
}

#[test]
fn weak_functor_context() {
    let delegate = MulticastDelegate::<()>::new();
    let context = Arc::new(());
    let calls = Rc::new(RefCell::new(0));

    let counter = calls.clone();
    delegate.add(DelegateBinding::from_weak_functor(&context, move |()| {
        *counter.borrow_mut() += 1;
    }));

    delegate.broadcast(());
    assert_eq!(*calls.borrow(), 1);

    drop(context);
    delegate.broadcast(());
    assert_eq!(*calls.borrow(), 1);
    assert!(delegate.is_empty());
}
