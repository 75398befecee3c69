use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use parklot::persist::PersistenceMode;
use parklot::store::OccupancyStore;

fn populated(spaces: i64) -> OccupancyStore {
    let store = OccupancyStore::open(PersistenceMode::InMemory).unwrap();
    for number in 1..=spaces {
        store.register_space(number, "car").unwrap();
        store
            .register_vehicle(&format!("BEN{number:04}"), None, None, None)
            .unwrap();
    }
    store
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let store = populated(1);
    let vehicle = store.list_vehicles().unwrap()[0].id;
    let space = store.list_spaces().unwrap()[0].id;
    c.bench_function("check in and out", |b| {
        b.iter(|| {
            let occupancy = store.check_in(black_box(vehicle), black_box(space)).unwrap();
            store.check_out(occupancy).unwrap();
        })
    });

    let store = populated(500);
    let vehicles = store.list_vehicles().unwrap();
    let spaces = store.list_spaces().unwrap();
    for (vehicle, space) in vehicles.iter().zip(spaces.iter()).step_by(2) {
        store.check_in(vehicle.id, space.id).unwrap();
    }
    c.bench_function("list free 500", |b| b.iter(|| store.list_free_spaces().unwrap()));
    c.bench_function("list active 250", |b| b.iter(|| store.list_active().unwrap()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
