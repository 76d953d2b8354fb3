use {
    namepool::{
        serialize, CaseSensitivity, EntryId, Name, NamePool, NamePoolConfig, NameView, Reserved,
    },
    std::{
        io::Cursor,
        sync::{Arc, Barrier},
        thread,
    },
};

fn test_pool() -> NamePool {
    NamePool::new(NamePoolConfig::default()).unwrap()
}

#[test]
fn first_casing_becomes_the_display_form() {
    let pool = test_pool();

    let id = pool.find_or_add(NameView::Ansi(b"SkeletalMesh")).unwrap();
    assert_eq!(
        pool.find_or_add(NameView::Ansi(b"SKELETALMESH")).unwrap(),
        id
    );
    assert_eq!(
        pool.find_or_add(NameView::Ansi(b"skeletalmesh")).unwrap(),
        id
    );

    assert_eq!(pool.resolve(id).to_string_lossy(), "SkeletalMesh");
    assert_eq!(pool.try_resolve(id).unwrap().to_string_lossy(), "SkeletalMesh");
}

#[test]
fn case_sensitivity_of_lookups() {
    let pool = test_pool();
    let id = pool.find_or_add(NameView::Ansi(b"Rotator")).unwrap();

    assert_eq!(
        pool.get(NameView::Ansi(b"rotator"), CaseSensitivity::IgnoreCase),
        Some(id)
    );
    assert_eq!(
        pool.get(NameView::Ansi(b"Rotator"), CaseSensitivity::CaseSensitive),
        Some(id)
    );
    assert_eq!(
        pool.get(NameView::Ansi(b"rotator"), CaseSensitivity::CaseSensitive),
        None
    );
    assert_eq!(
        pool.get(NameView::Ansi(b"Translator"), CaseSensitivity::IgnoreCase),
        None
    );
}

#[test]
fn handles_split_numeric_suffixes() {
    let spawn_7 = Name::new("SpawnPoint_7").unwrap();
    let spawn = Name::new("SpawnPoint").unwrap();

    assert_eq!(spawn_7.number(), Some(7));
    assert_eq!(spawn_7.comparison_id(), spawn.comparison_id());
    assert_ne!(spawn_7, spawn);
    assert_eq!(spawn_7.to_string_lossy(), "SpawnPoint_7");
    assert_eq!(Name::parse("SpawnPoint_7").unwrap(), spawn_7);
}

#[test]
fn none_is_free() {
    assert_eq!(Name::new("none").unwrap(), Name::NONE);
    assert_eq!(Name::default().to_string_lossy(), "None");
    assert_eq!(Name::from_reserved(Reserved::None), Name::NONE);

    let pool = test_pool();
    assert_eq!(pool.find_or_add(NameView::Ansi(b"")).unwrap(), EntryId::NONE);
    assert_eq!(pool.resolve(EntryId::NONE).to_string_lossy(), "None");
}

#[test]
fn wide_and_narrow_spellings_unify() {
    let pool = test_pool();

    let narrow = pool.find_or_add(NameView::Ansi(b"Landscape")).unwrap();
    let wide_units: Vec<u16> = "landscape".encode_utf16().collect();
    assert_eq!(pool.find_or_add(NameView::Wide(&wide_units)).unwrap(), narrow);

    let umlauts: Vec<u16> = "Straße".encode_utf16().collect();
    let wide = pool.find_or_add(NameView::Wide(&umlauts)).unwrap();
    assert!(pool.resolve(wide).is_wide());
    assert_eq!(pool.resolve(wide).to_string_lossy(), "Straße");
}

#[test]
fn concurrent_interning_agrees_on_ids() {
    const THREADS: usize = 10;
    const NAMES: usize = 1000;

    let pool = Arc::new(test_pool());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|thread| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                // Every thread interns the same names, in a different order.
                (0..NAMES)
                    .map(|i| {
                        let i = (i + thread * 101) % NAMES;
                        let name = format!("Entity{i}");
                        (i, pool.find_or_add(NameView::Ansi(name.as_bytes())).unwrap())
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut agreed = vec![None; NAMES];
    for handle in handles {
        for (i, id) in handle.join().unwrap() {
            match agreed[i] {
                None => agreed[i] = Some(id),
                Some(expected) => assert_eq!(id, expected, "ids diverged for Entity{i}"),
            }
        }
    }

    let stats = pool.stats();
    assert_eq!(stats.entries, pool.len());
    for (i, id) in agreed.into_iter().enumerate() {
        let id = id.unwrap();
        assert_eq!(pool.resolve(id).to_string_lossy(), format!("Entity{i}"));
    }
}

#[test]
fn batch_reload_ten_thousand_names() {
    let writer_pool = test_pool();

    let ids: Vec<EntryId> = (0..10_000)
        .map(|i| {
            let name = format!("Asset/Path/Object{i}");
            writer_pool.find_or_add(NameView::Ansi(name.as_bytes())).unwrap()
        })
        .collect();

    let mut stream = Vec::new();
    serialize::save_name_batch(&writer_pool, &ids, &mut stream).unwrap();

    let reader_pool = test_pool();
    let table = serialize::load_name_batch(&reader_pool, &mut Cursor::new(&stream)).unwrap();

    assert_eq!(table.len(), ids.len());
    for (i, &id) in table.iter().enumerate() {
        assert_eq!(
            reader_pool.resolve(id).to_string_lossy(),
            format!("Asset/Path/Object{i}")
        );
    }
}

#[test]
fn inline_name_round_trip_across_pools() {
    let writer_pool = test_pool();
    let reader_pool = test_pool();

    let name = Name::from_view(&writer_pool, NameView::Ansi(b"Checkpoint"), Some(12)).unwrap();

    let mut stream = Vec::new();
    serialize::write_name(&writer_pool, name, &mut stream).unwrap();

    let read = serialize::read_name(&reader_pool, &mut Cursor::new(&stream)).unwrap();
    assert_eq!(read.number(), Some(12));
    assert_eq!(
        reader_pool.resolve(read.comparison_id()).to_string_lossy(),
        "Checkpoint"
    );
}

#[test]
fn reserved_names_resolve_without_interning() {
    let pool = test_pool();
    let before = pool.len();

    for reserved in [Reserved::Object, Reserved::Class, Reserved::Default] {
        let id = pool.reserved(reserved);
        assert_eq!(
            pool.resolve(id).to_string_lossy(),
            reserved.as_str(),
            "reserved table mismatch"
        );
    }

    assert_eq!(pool.len(), before);
}
