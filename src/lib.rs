//! Parklot – the persistence and state-transition core of a parking lot tracker.
//!
//! Parklot records which vehicle occupies which numbered parking space and
//! when. It keeps three kinds of records:
//! * A [`construct::Vehicle`] is a registered license plate with optional
//!   model, color and owner. Plates are unique after trimming and upper-casing.
//! * A [`construct::Space`] is a uniquely numbered slot of some kind (car,
//!   motorcycle, ...) whose [`datatype::SpaceStatus`] is FREE or OCCUPIED.
//! * A [`construct::Occupancy`] links one vehicle to one space from its entry
//!   time until its exit time. It is *active* while the exit time is unset.
//!
//! A space is OCCUPIED exactly when one active occupancy references it. The
//! only operations that change status are [`store::OccupancyStore::check_in`]
//! and [`store::OccupancyStore::check_out`], and each runs as a single SQLite
//! transaction so that the occupancy and the status commit together.
//!
//! ## Modules
//! * [`construct`] – Records handed across the API, plus report rows.
//! * [`datatype`] – Space status, timestamps, input normalization and their SQLite mapping.
//! * [`persist`] – Connection opening, the idempotent schema, and row level SQL.
//! * [`store`] – The [`store::OccupancyStore`] with every public operation.
//! * [`config`] – Settings read from a file and the environment.
//! * [`error`] – [`error::ParkingError`] and the crate [`Result`] alias.
//!
//! ## Quick Start
//! ```
//! use parklot::{persist::PersistenceMode, store::OccupancyStore};
//! let store = OccupancyStore::open(PersistenceMode::InMemory).unwrap();
//! let car = store.register_vehicle("abc1234", Some("Civic"), None, None).unwrap();
//! let spot = store.register_space(1, "car").unwrap();
//! let stay = store.check_in(car, spot).unwrap();
//! assert_eq!(store.list_active().unwrap().len(), 1);
//! store.check_out(stay).unwrap();
//! assert!(store.list_active().unwrap().is_empty());
//! ```
//!
//! ## Logging
//! Operations emit `tracing` events. The library never installs a subscriber;
//! the `parklot` binary does.

pub mod config;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod persist;
pub mod store;

pub use error::{ParkingError, Result};
