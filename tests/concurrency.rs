use std::sync::{Arc, Barrier};
use std::thread;

use parklot::datatype::SpaceStatus;
use parklot::persist::PersistenceMode;
use parklot::store::OccupancyStore;
use parklot::ParkingError;

const CONTENDERS: usize = 8;

fn tally(results: Vec<parklot::Result<i64>>) -> (usize, usize) {
    let mut won = 0;
    let mut conflicted = 0;
    for result in results {
        match result {
            Ok(_) => won += 1,
            Err(ParkingError::Conflict(_)) => conflicted += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    (won, conflicted)
}

#[test]
fn shared_store_admits_one_check_in_per_space() {
    let store = Arc::new(OccupancyStore::open(PersistenceMode::InMemory).expect("store"));
    let space = store.register_space(1, "car").unwrap();
    let vehicles: Vec<i64> = (0..CONTENDERS)
        .map(|i| {
            store
                .register_vehicle(&format!("CAR{i:04}"), None, None, None)
                .unwrap()
        })
        .collect();

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = vehicles
        .into_iter()
        .map(|vehicle| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.check_in(vehicle, space)
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, CONTENDERS - 1));
    assert_eq!(store.list_active().unwrap().len(), 1);
    assert!(store.audit().unwrap().is_empty());
}

#[test]
fn separate_handles_on_one_file_admit_one_check_in() {
    let dir = tempfile::tempdir().unwrap();
    let mode = PersistenceMode::File(dir.path().join("race.db").to_string_lossy().into_owned());
    let setup = OccupancyStore::open(mode.clone()).expect("store");
    let space = setup.register_space(1, "car").unwrap();
    let vehicles: Vec<i64> = (0..CONTENDERS)
        .map(|i| {
            setup
                .register_vehicle(&format!("VAN{i:04}"), None, None, None)
                .unwrap()
        })
        .collect();
    // every contender gets its own connection
    let stores: Vec<OccupancyStore> = (0..CONTENDERS)
        .map(|_| OccupancyStore::open(mode.clone()).expect("handle"))
        .collect();

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = stores
        .into_iter()
        .zip(vehicles)
        .map(|(store, vehicle)| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.check_in(vehicle, space)
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, CONTENDERS - 1));
    assert_eq!(
        setup.space(space).unwrap().unwrap().status,
        SpaceStatus::Occupied
    );
    assert_eq!(setup.list_history().unwrap().len(), 1);
    assert!(setup.audit().unwrap().is_empty());
}

#[test]
fn concurrent_check_outs_close_once() {
    let store = Arc::new(OccupancyStore::open(PersistenceMode::InMemory).expect("store"));
    let vehicle = store.register_vehicle("ONE0001", None, None, None).unwrap();
    let space = store.register_space(1, "car").unwrap();
    let occupancy = store.check_in(vehicle, space).unwrap();

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.check_out(occupancy).map(|_| occupancy)
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, CONTENDERS - 1));
    assert_eq!(store.list_free_spaces().unwrap().len(), 1);
}
