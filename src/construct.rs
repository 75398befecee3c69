// used to print out readable forms of a construct
use std::fmt;

use chrono::Duration;

// our own stuff that we need
use crate::datatype::{SpaceStatus, Timestamp};

// ------------- Identities -------------
// Identities are assigned by the store (SQLite row ids) and handed to callers
// as plain integers.
pub type VehicleId = i64;
pub type SpaceId = i64;
pub type OccupancyId = i64;

// ------------- Vehicle -------------
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub model: Option<String>,
    pub color: Option<String>,
    pub owner: Option<String>,
}
impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - {}", self.plate, self.model.as_deref().unwrap_or(""))
    }
}

// ------------- Space -------------
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub struct Space {
    pub id: SpaceId,
    pub number: i64,
    pub kind: String,
    pub status: SpaceStatus,
}
impl Space {
    pub fn is_free(&self) -> bool {
        self.status == SpaceStatus::Free
    }
}
impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Space {} ({}) - {}", self.number, self.kind, self.status)
    }
}

// ------------- Occupancy -------------
/// One stay of a vehicle in a space. Active while `exited_at` is `None`.
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub struct Occupancy {
    pub id: OccupancyId,
    pub vehicle: VehicleId,
    pub space: SpaceId,
    pub entered_at: Timestamp,
    pub exited_at: Option<Timestamp>,
}
impl Occupancy {
    pub fn is_active(&self) -> bool {
        self.exited_at.is_none()
    }
    /// Length of the stay, measured up to `now` while it is still active.
    pub fn duration(&self, now: Timestamp) -> Duration {
        self.exited_at.unwrap_or(now).since(&self.entered_at)
    }
}

/// An occupancy joined to the vehicle and space it references.
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct OccupancyView {
    pub occupancy: Occupancy,
    pub vehicle: Vehicle,
    pub space: Space,
}
impl OccupancyView {
    pub fn into_parts(self) -> (Occupancy, Vehicle, Space) {
        (self.occupancy, self.vehicle, self.space)
    }
}
impl fmt::Display for OccupancyView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} {} in space {} since {}",
            self.occupancy.id, self.vehicle.plate, self.space.number, self.occupancy.entered_at
        )?;
        if let Some(exited_at) = self.occupancy.exited_at {
            write!(f, " until {}", exited_at)?;
        }
        Ok(())
    }
}

// ------------- Reports -------------
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct OccupancySummary {
    pub vehicles: u64,
    pub spaces: u64,
    pub free_spaces: u64,
    pub occupied_spaces: u64,
    pub active_occupancies: u64,
}
impl fmt::Display for OccupancySummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} vehicles, {} spaces ({} free, {} occupied), {} active occupancies",
            self.vehicles, self.spaces, self.free_spaces, self.occupied_spaces, self.active_occupancies
        )
    }
}

/// A space whose status disagrees with the number of active occupancies on it.
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct StatusMismatch {
    pub space: SpaceId,
    pub number: i64,
    pub status: SpaceStatus,
    pub active_occupancies: u64,
}
impl fmt::Display for StatusMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "space {} is {} with {} active occupancies",
            self.number, self.status, self.active_occupancies
        )
    }
}
