// used for persistence
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::time::Duration;
use tracing::debug;

use crate::construct::{
    Occupancy, OccupancyId, OccupancySummary, OccupancyView, Space, SpaceId, StatusMismatch,
    Vehicle, VehicleId,
};
use crate::datatype::{SpaceStatus, Timestamp};
use crate::error::{ParkingError, Result};

pub const SCHEMA_VERSION: &str = "1";

/// How long a connection waits on another writer before giving up.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Where the store keeps its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    /// A private database that disappears with the store.
    InMemory,
    /// A database file, created on first open.
    File(String),
}
impl PersistenceMode {
    /// `:memory:` selects the in-memory mode, anything else is a file path.
    /// A blank path is rejected, SQLite would silently open a temporary database.
    pub fn from_path(path: &str) -> Result<Self> {
        match path.trim() {
            "" => Err(ParkingError::Config("database path must not be blank".to_string())),
            ":memory:" => Ok(PersistenceMode::InMemory),
            path => Ok(PersistenceMode::File(path.to_string())),
        }
    }
}

/// Opens a connection for `mode` and makes sure the schema exists.
pub fn open(mode: &PersistenceMode, busy_timeout: Duration) -> Result<Connection> {
    let connection = match mode {
        PersistenceMode::InMemory => Connection::open_in_memory()?,
        PersistenceMode::File(path) => Connection::open(path)?,
    };
    connection.busy_timeout(busy_timeout)?;
    connection.execute_batch("pragma foreign_keys = on;")?;
    if let PersistenceMode::File(path) = mode {
        let journal_mode: String =
            connection.query_row("pragma journal_mode = wal", [], |row| row.get(0))?;
        debug!(%path, %journal_mode, "opened database file");
    }
    establish_schema(&connection)?;
    Ok(connection)
}

/// Creates the tables unless they already exist. Safe to run on every open.
pub fn establish_schema(connection: &Connection) -> Result<()> {
    // Plain declared types rather than STRICT tables, so that external tools
    // can still read the file.
    connection.execute_batch(
        "
        create table if not exists Meta (
            Key text not null,
            Value text not null,
            constraint referenceable_Key primary key (
                Key
            )
        );
        create table if not exists Vehicle (
            Vehicle_Identity integer,
            Plate text not null,
            Model text null,
            Color text null,
            Owner text null,
            constraint referenceable_Vehicle_Identity primary key (
                Vehicle_Identity
            ),
            constraint unique_Plate unique (
                Plate
            ),
            constraint required_Plate check (
                length(trim(Plate)) > 0
            )
        );
        create table if not exists Space (
            Space_Identity integer,
            Number integer not null,
            Kind text not null default 'car',
            Status text not null default 'FREE',
            constraint referenceable_Space_Identity primary key (
                Space_Identity
            ),
            constraint unique_Number unique (
                Number
            ),
            constraint positive_Number check (
                Number > 0
            ),
            constraint known_Status check (
                Status in ('FREE', 'OCCUPIED')
            )
        );
        create table if not exists Occupancy (
            Occupancy_Identity integer,
            Vehicle_Identity integer not null,
            Space_Identity integer not null,
            EntryTime text not null,
            ExitTime text null,
            constraint referenceable_Occupancy_Identity primary key (
                Occupancy_Identity
            ),
            constraint Occupancy_of_Vehicle foreign key (
                Vehicle_Identity
            ) references Vehicle(Vehicle_Identity),
            constraint Occupancy_of_Space foreign key (
                Space_Identity
            ) references Space(Space_Identity),
            constraint ordered_Times check (
                ExitTime is null or ExitTime >= EntryTime
            )
        );
        create unique index if not exists one_active_Occupancy_per_Space
            on Occupancy (Space_Identity)
            where ExitTime is null;
        create index if not exists Occupancy_by_EntryTime
            on Occupancy (EntryTime);
        ",
    )?;
    connection.execute(
        "insert or ignore into Meta (Key, Value) values ('schema_version', ?)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

// ------------- Row mapping -------------
// Column order of every select below: Occupancy (5), Vehicle (5), Space (4).
const OCCUPANCY_COLUMNS: &str =
    "o.Occupancy_Identity, o.Vehicle_Identity, o.Space_Identity, o.EntryTime, o.ExitTime";
const VEHICLE_COLUMNS: &str = "v.Vehicle_Identity, v.Plate, v.Model, v.Color, v.Owner";
const SPACE_COLUMNS: &str = "s.Space_Identity, s.Number, s.Kind, s.Status";

fn vehicle_at(row: &Row, offset: usize) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get(offset)?,
        plate: row.get(offset + 1)?,
        model: row.get(offset + 2)?,
        color: row.get(offset + 3)?,
        owner: row.get(offset + 4)?,
    })
}

fn space_at(row: &Row, offset: usize) -> rusqlite::Result<Space> {
    Ok(Space {
        id: row.get(offset)?,
        number: row.get(offset + 1)?,
        kind: row.get(offset + 2)?,
        status: row.get(offset + 3)?,
    })
}

fn occupancy_at(row: &Row, offset: usize) -> rusqlite::Result<Occupancy> {
    Ok(Occupancy {
        id: row.get(offset)?,
        vehicle: row.get(offset + 1)?,
        space: row.get(offset + 2)?,
        entered_at: row.get(offset + 3)?,
        exited_at: row.get(offset + 4)?,
    })
}

fn view_at(row: &Row) -> rusqlite::Result<OccupancyView> {
    Ok(OccupancyView {
        occupancy: occupancy_at(row, 0)?,
        vehicle: vehicle_at(row, 5)?,
        space: space_at(row, 10)?,
    })
}

// ------------- Persistence -------------
/// Row level reads and writes. Works on a plain connection as well as on an
/// open transaction, which dereferences to one.
pub struct Persistor<'db> {
    pub db: &'db Connection,
}
impl<'db> Persistor<'db> {
    pub fn new(connection: &'db Connection) -> Persistor<'db> {
        Persistor { db: connection }
    }

    pub fn schema_version(&self) -> rusqlite::Result<Option<String>> {
        self.db
            .prepare_cached("select Value from Meta where Key = 'schema_version'")?
            .query_row([], |r| r.get(0))
            .optional()
    }

    // Vehicles
    pub fn add_vehicle(
        &self,
        plate: &str,
        model: Option<&str>,
        color: Option<&str>,
        owner: Option<&str>,
    ) -> rusqlite::Result<VehicleId> {
        self.db
            .prepare_cached(
                "
                insert into Vehicle (
                    Plate,
                    Model,
                    Color,
                    Owner
                ) values (?, ?, ?, ?)
            ",
            )?
            .execute(params![plate, model, color, owner])?;
        Ok(self.db.last_insert_rowid())
    }
    pub fn vehicle(&self, id: VehicleId) -> rusqlite::Result<Option<Vehicle>> {
        self.db
            .prepare_cached(&format!(
                "select {VEHICLE_COLUMNS} from Vehicle v where v.Vehicle_Identity = ?"
            ))?
            .query_row(params![id], |r| vehicle_at(r, 0))
            .optional()
    }
    pub fn vehicle_by_plate(&self, plate: &str) -> rusqlite::Result<Option<Vehicle>> {
        self.db
            .prepare_cached(&format!(
                "select {VEHICLE_COLUMNS} from Vehicle v where v.Plate = ?"
            ))?
            .query_row(params![plate], |r| vehicle_at(r, 0))
            .optional()
    }
    pub fn all_vehicles(&self) -> rusqlite::Result<Vec<Vehicle>> {
        self.db
            .prepare_cached(&format!(
                "select {VEHICLE_COLUMNS} from Vehicle v order by v.Plate"
            ))?
            .query_map([], |r| vehicle_at(r, 0))?
            .collect()
    }

    // Spaces
    pub fn add_space(&self, number: i64, kind: &str) -> rusqlite::Result<SpaceId> {
        self.db
            .prepare_cached(
                "
                insert into Space (
                    Number,
                    Kind,
                    Status
                ) values (?, ?, ?)
            ",
            )?
            .execute(params![number, kind, SpaceStatus::Free])?;
        Ok(self.db.last_insert_rowid())
    }
    pub fn space(&self, id: SpaceId) -> rusqlite::Result<Option<Space>> {
        self.db
            .prepare_cached(&format!(
                "select {SPACE_COLUMNS} from Space s where s.Space_Identity = ?"
            ))?
            .query_row(params![id], |r| space_at(r, 0))
            .optional()
    }
    pub fn all_spaces(&self) -> rusqlite::Result<Vec<Space>> {
        self.db
            .prepare_cached(&format!(
                "select {SPACE_COLUMNS} from Space s order by s.Number"
            ))?
            .query_map([], |r| space_at(r, 0))?
            .collect()
    }
    pub fn spaces_with_status(&self, status: SpaceStatus) -> rusqlite::Result<Vec<Space>> {
        self.db
            .prepare_cached(&format!(
                "select {SPACE_COLUMNS} from Space s where s.Status = ? order by s.Number"
            ))?
            .query_map(params![status], |r| space_at(r, 0))?
            .collect()
    }
    /// Moves a space from `from` to `to`, returning the number of rows changed.
    /// Zero means the space was not in status `from`.
    pub fn transition_space(
        &self,
        id: SpaceId,
        from: SpaceStatus,
        to: SpaceStatus,
    ) -> rusqlite::Result<usize> {
        self.db
            .prepare_cached("update Space set Status = ? where Space_Identity = ? and Status = ?")?
            .execute(params![to, id, from])
    }

    // Occupancies
    pub fn add_occupancy(
        &self,
        vehicle: VehicleId,
        space: SpaceId,
        entered_at: &Timestamp,
    ) -> rusqlite::Result<OccupancyId> {
        self.db
            .prepare_cached(
                "
                insert into Occupancy (
                    Vehicle_Identity,
                    Space_Identity,
                    EntryTime,
                    ExitTime
                ) values (?, ?, ?, null)
            ",
            )?
            .execute(params![vehicle, space, entered_at])?;
        Ok(self.db.last_insert_rowid())
    }
    pub fn occupancy(&self, id: OccupancyId) -> rusqlite::Result<Option<Occupancy>> {
        self.db
            .prepare_cached(&format!(
                "select {OCCUPANCY_COLUMNS} from Occupancy o where o.Occupancy_Identity = ?"
            ))?
            .query_row(params![id], |r| occupancy_at(r, 0))
            .optional()
    }
    /// Sets the exit time of an active occupancy, returning the number of rows changed.
    pub fn close_occupancy(
        &self,
        id: OccupancyId,
        exited_at: &Timestamp,
    ) -> rusqlite::Result<usize> {
        self.db
            .prepare_cached(
                "update Occupancy set ExitTime = ? where Occupancy_Identity = ? and ExitTime is null",
            )?
            .execute(params![exited_at, id])
    }
    pub fn active_occupancies(&self) -> rusqlite::Result<Vec<OccupancyView>> {
        self.db
            .prepare_cached(&format!(
                "
                select {OCCUPANCY_COLUMNS},
                       {VEHICLE_COLUMNS},
                       {SPACE_COLUMNS}
                    from Occupancy o
                    join Vehicle v
                    on v.Vehicle_Identity = o.Vehicle_Identity
                    join Space s
                    on s.Space_Identity = o.Space_Identity
                    where o.ExitTime is null
                    order by o.EntryTime, o.Occupancy_Identity
            "
            ))?
            .query_map([], view_at)?
            .collect()
    }
    pub fn all_occupancies(&self) -> rusqlite::Result<Vec<OccupancyView>> {
        self.db
            .prepare_cached(&format!(
                "
                select {OCCUPANCY_COLUMNS},
                       {VEHICLE_COLUMNS},
                       {SPACE_COLUMNS}
                    from Occupancy o
                    join Vehicle v
                    on v.Vehicle_Identity = o.Vehicle_Identity
                    join Space s
                    on s.Space_Identity = o.Space_Identity
                    order by o.EntryTime desc, o.Occupancy_Identity desc
            "
            ))?
            .query_map([], view_at)?
            .collect()
    }

    // Reports
    pub fn summary(&self) -> rusqlite::Result<OccupancySummary> {
        self.db
            .prepare_cached(
                "
                select (select count(*) from Vehicle),
                       (select count(*) from Space),
                       (select count(*) from Space where Status = 'FREE'),
                       (select count(*) from Space where Status = 'OCCUPIED'),
                       (select count(*) from Occupancy where ExitTime is null)
            ",
            )?
            .query_row([], |r| {
                Ok(OccupancySummary {
                    vehicles: r.get::<_, i64>(0)? as u64,
                    spaces: r.get::<_, i64>(1)? as u64,
                    free_spaces: r.get::<_, i64>(2)? as u64,
                    occupied_spaces: r.get::<_, i64>(3)? as u64,
                    active_occupancies: r.get::<_, i64>(4)? as u64,
                })
            })
    }
    pub fn status_mismatches(&self) -> rusqlite::Result<Vec<StatusMismatch>> {
        self.db
            .prepare_cached(
                "
                select s.Space_Identity,
                       s.Number,
                       s.Status,
                       count(o.Occupancy_Identity) as Active
                    from Space s
                    left join Occupancy o
                    on o.Space_Identity = s.Space_Identity
                    and o.ExitTime is null
                    group by s.Space_Identity, s.Number, s.Status
                    having (s.Status = 'OCCUPIED' and count(o.Occupancy_Identity) <> 1)
                        or (s.Status = 'FREE' and count(o.Occupancy_Identity) <> 0)
                    order by s.Number
            ",
            )?
            .query_map([], |r| {
                Ok(StatusMismatch {
                    space: r.get(0)?,
                    number: r.get(1)?,
                    status: r.get(2)?,
                    active_occupancies: r.get::<_, i64>(3)? as u64,
                })
            })?
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_can_be_established_repeatedly() {
        let connection = Connection::open_in_memory().unwrap();
        establish_schema(&connection).unwrap();
        establish_schema(&connection).unwrap();
        let persistor = Persistor::new(&connection);
        assert_eq!(persistor.schema_version().unwrap().as_deref(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn schema_rejects_a_second_active_occupancy_per_space() {
        let connection = open(&PersistenceMode::InMemory, Duration::from_millis(100)).unwrap();
        let persistor = Persistor::new(&connection);
        let first = persistor.add_vehicle("AAA0001", None, None, None).unwrap();
        let second = persistor.add_vehicle("BBB0002", None, None, None).unwrap();
        let space = persistor.add_space(1, "car").unwrap();
        persistor.add_occupancy(first, space, &Timestamp::now()).unwrap();
        assert!(persistor.add_occupancy(second, space, &Timestamp::now()).is_err());
    }

    #[test]
    fn schema_enforces_references() {
        let connection = open(&PersistenceMode::InMemory, Duration::from_millis(100)).unwrap();
        let persistor = Persistor::new(&connection);
        assert!(persistor.add_occupancy(41, 42, &Timestamp::now()).is_err());
    }

    #[test]
    fn memory_path_selects_in_memory_mode() {
        assert_eq!(PersistenceMode::from_path(":memory:").unwrap(), PersistenceMode::InMemory);
        assert_eq!(
            PersistenceMode::from_path("lot.db").unwrap(),
            PersistenceMode::File("lot.db".to_string())
        );
    }

    #[test]
    fn blank_path_is_a_config_error() {
        for path in ["", "   "] {
            assert!(matches!(
                PersistenceMode::from_path(path),
                Err(ParkingError::Config(_))
            ));
        }
    }
}
