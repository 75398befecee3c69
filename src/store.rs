//! The occupancy store: registration, listings, and the two state transitions
//! (check-in and check-out) that keep space status and occupancies consistent.
//!
//! The store owns a single SQLite connection behind a mutex, so one store can
//! be shared between threads through a reference or an `Arc`. Check-in and
//! check-out run inside `IMMEDIATE` transactions, which also serializes them
//! against other stores opened on the same file.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::DatabaseSettings;
use crate::construct::{
    Occupancy, OccupancyId, OccupancySummary, OccupancyView, Space, SpaceId, StatusMismatch,
    Vehicle, VehicleId,
};
use crate::datatype::{
    normalize_kind, normalize_optional, normalize_plate, validate_space_number, SpaceStatus,
    Timestamp,
};
use crate::error::{conflict_on_unique, ParkingError, Result};
use crate::persist::{self, PersistenceMode, Persistor};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(persist::DEFAULT_BUSY_TIMEOUT_MS);

pub struct OccupancyStore {
    mode: PersistenceMode,
    connection: Mutex<Connection>,
}

impl OccupancyStore {
    /// Opens (and if needed creates) the store with the default busy timeout.
    pub fn open(mode: PersistenceMode) -> Result<Self> {
        Self::open_with_timeout(mode, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(mode: PersistenceMode, busy_timeout: Duration) -> Result<Self> {
        let connection = persist::open(&mode, busy_timeout)?;
        info!(mode = ?mode, "occupancy store opened");
        Ok(Self {
            mode,
            connection: Mutex::new(connection),
        })
    }

    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self> {
        Self::open_with_timeout(settings.mode()?, settings.busy_timeout())
    }

    pub fn mode(&self) -> &PersistenceMode {
        &self.mode
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|e| ParkingError::Lock(e.to_string()))
    }

    // ------------- Vehicles -------------
    pub fn register_vehicle(
        &self,
        plate: &str,
        model: Option<&str>,
        color: Option<&str>,
        owner: Option<&str>,
    ) -> Result<VehicleId> {
        let plate = normalize_plate(plate)?;
        let model = normalize_optional(model);
        let color = normalize_optional(color);
        let owner = normalize_optional(owner);
        let connection = self.connection()?;
        let id = Persistor::new(&connection)
            .add_vehicle(&plate, model.as_deref(), color.as_deref(), owner.as_deref())
            .map_err(|e| conflict_on_unique(e, || format!("plate {plate} is already registered")))?;
        debug!(id, %plate, "vehicle registered");
        Ok(id)
    }

    /// All vehicles, ordered by plate.
    pub fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).all_vehicles()?)
    }

    pub fn vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).vehicle(id)?)
    }

    /// Looks a vehicle up by plate, normalized the same way as on registration.
    pub fn vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        let plate = normalize_plate(plate)?;
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).vehicle_by_plate(&plate)?)
    }

    // ------------- Spaces -------------
    /// Registers a FREE space. A blank `kind` becomes the default kind.
    pub fn register_space(&self, number: i64, kind: &str) -> Result<SpaceId> {
        let number = validate_space_number(number)?;
        let kind = normalize_kind(kind);
        let connection = self.connection()?;
        let id = Persistor::new(&connection)
            .add_space(number, &kind)
            .map_err(|e| conflict_on_unique(e, || format!("space {number} is already registered")))?;
        debug!(id, number, %kind, "space registered");
        Ok(id)
    }

    /// All spaces, ordered by number.
    pub fn list_spaces(&self) -> Result<Vec<Space>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).all_spaces()?)
    }

    /// FREE spaces, ordered by number. These are the valid check-in targets.
    pub fn list_free_spaces(&self) -> Result<Vec<Space>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).spaces_with_status(SpaceStatus::Free)?)
    }

    pub fn space(&self, id: SpaceId) -> Result<Option<Space>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).space(id)?)
    }

    // ------------- Occupancies -------------
    /// Opens an occupancy of `space` by `vehicle` and marks the space OCCUPIED.
    ///
    /// Fails with `NotFound` if either identity is unknown and with `Conflict`
    /// if the space is not FREE. Nothing is written unless both the new
    /// occupancy and the status change commit.
    pub fn check_in(&self, vehicle: VehicleId, space: SpaceId) -> Result<OccupancyId> {
        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let persistor = Persistor::new(&tx);

        let target = persistor.space(space)?.ok_or(ParkingError::NotFound {
            entity: "space",
            id: space,
        })?;
        if persistor.vehicle(vehicle)?.is_none() {
            return Err(ParkingError::NotFound {
                entity: "vehicle",
                id: vehicle,
            });
        }
        if !target.is_free() {
            warn!(space, number = target.number, "check-in rejected, space occupied");
            return Err(ParkingError::Conflict(format!(
                "space {} is occupied",
                target.number
            )));
        }

        let entered_at = Timestamp::now();
        let occupancy = persistor
            .add_occupancy(vehicle, space, &entered_at)
            .map_err(|e| conflict_on_unique(e, || format!("space {} is occupied", target.number)))?;
        if persistor.transition_space(space, SpaceStatus::Free, SpaceStatus::Occupied)? != 1 {
            return Err(ParkingError::Conflict(format!(
                "space {} is occupied",
                target.number
            )));
        }
        tx.commit()?;
        debug!(occupancy, vehicle, space, %entered_at, "checked in");
        Ok(occupancy)
    }

    /// Closes an active occupancy and frees its space.
    ///
    /// Fails with `NotFound` for an unknown occupancy and with `Conflict` if it
    /// is already closed.
    pub fn check_out(&self, occupancy: OccupancyId) -> Result<()> {
        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let persistor = Persistor::new(&tx);

        let current = persistor.occupancy(occupancy)?.ok_or(ParkingError::NotFound {
            entity: "occupancy",
            id: occupancy,
        })?;
        if !current.is_active() {
            warn!(occupancy, "check-out rejected, occupancy already closed");
            return Err(ParkingError::Conflict(format!(
                "occupancy {occupancy} is already closed"
            )));
        }

        let exited_at = Timestamp::now().not_before(current.entered_at);
        if persistor.close_occupancy(occupancy, &exited_at)? != 1 {
            return Err(ParkingError::Conflict(format!(
                "occupancy {occupancy} is already closed"
            )));
        }
        if persistor.transition_space(current.space, SpaceStatus::Occupied, SpaceStatus::Free)? != 1 {
            return Err(ParkingError::Invariant(format!(
                "space {} of active occupancy {occupancy} is not occupied",
                current.space
            )));
        }
        tx.commit()?;
        debug!(occupancy, space = current.space, %exited_at, "checked out");
        Ok(())
    }

    pub fn occupancy(&self, id: OccupancyId) -> Result<Option<Occupancy>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).occupancy(id)?)
    }

    /// Active occupancies with their vehicle and space, oldest entry first.
    pub fn list_active(&self) -> Result<Vec<OccupancyView>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).active_occupancies()?)
    }

    /// Every occupancy ever opened, most recent entry first.
    pub fn list_history(&self) -> Result<Vec<OccupancyView>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).all_occupancies()?)
    }

    // ------------- Reports -------------
    pub fn summary(&self) -> Result<OccupancySummary> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).summary()?)
    }

    /// Spaces whose status disagrees with their active occupancies. Empty when consistent.
    pub fn audit(&self) -> Result<Vec<StatusMismatch>> {
        let connection = self.connection()?;
        Ok(Persistor::new(&connection).status_mismatches()?)
    }
}
