//! Bit-packed 64-bit shard identifier: `TimeMillis 39 | Worker 2 | Database
//! 10 | Rotate 2 | Sequence 10`.

use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Start of the epoch this id's time field is offset from: 2024-02-19
/// 00:00:00 UTC.
pub const EPOCH_MILLIS: i64 = 1_708_300_800_000;

/// The last millisecond representable in the 39-bit time field.
pub const END_MILLIS: i64 = 2_244_844_800_000;

const SEQUENCE_BITS: u32 = 10;
const ROTATE_BITS: u32 = 2;
const DATABASE_BITS: u32 = 10;
const WORKER_BITS: u32 = 2;

const SEQUENCE_SHIFT: u32 = 0;
const ROTATE_SHIFT: u32 = SEQUENCE_SHIFT + SEQUENCE_BITS;
const DATABASE_SHIFT: u32 = ROTATE_SHIFT + ROTATE_BITS;
const WORKER_SHIFT: u32 = DATABASE_SHIFT + DATABASE_BITS;
const TIME_SHIFT: u32 = WORKER_SHIFT + WORKER_BITS;

/// Max sequence value before a rollover forces the clock forward.
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;
/// Max database index representable in the 10-bit database field.
pub const MAX_DATABASE: u16 = (1 << DATABASE_BITS) - 1;
/// Max worker id representable in the 2-bit worker field.
pub const MAX_WORKER: u8 = (1 << WORKER_BITS) - 1;

fn mask(bits: u32) -> i64 {
    (1i64 << bits) - 1
}

/// Table-rotation discipline controlling the suffix appended to a rotated
/// table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotate {
    /// No suffix.
    None = 0,
    /// `_YYYYMM`.
    Monthly = 1,
    /// `_YYYY0WW` (ISO week, zero-padded to three digits).
    Weekly = 2,
    /// `_YYYYMMDD`.
    Daily = 3,
}

impl Rotate {
    fn from_u8(v: u8) -> Self {
        match v & 0b11 {
            0 => Rotate::None,
            1 => Rotate::Monthly,
            2 => Rotate::Weekly,
            _ => Rotate::Daily,
        }
    }
}

/// A decoded shard identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id {
    /// The packed 64-bit value, safe to sort lexicographically as an
    /// integer and to persist as a signed bigint column.
    pub value: i64,
    /// Milliseconds since [`EPOCH_MILLIS`].
    pub time_millis: i64,
    pub worker_id: u8,
    pub database_id: u16,
    pub rotate: Rotate,
    pub sequence: u16,
}

impl Id {
    /// Packs `(time, worker, database, rotate, sequence)` into a shard id.
    pub fn build(
        time: DateTime<Utc>,
        worker_id: u8,
        database_id: u16,
        rotate: Rotate,
        sequence: u16,
    ) -> Id {
        let time_millis = time.timestamp_millis() - EPOCH_MILLIS;
        let value = (time_millis << TIME_SHIFT)
            | ((worker_id as i64) << WORKER_SHIFT)
            | ((database_id as i64) << DATABASE_SHIFT)
            | ((rotate as i64) << ROTATE_SHIFT)
            | (sequence as i64);
        Id {
            value,
            time_millis,
            worker_id,
            database_id,
            rotate,
            sequence,
        }
    }

    /// Unpacks a previously-encoded 64-bit value.
    pub fn parse(value: i64) -> Id {
        let sequence = ((value >> SEQUENCE_SHIFT) & mask(SEQUENCE_BITS)) as u16;
        let rotate = Rotate::from_u8(((value >> ROTATE_SHIFT) & mask(ROTATE_BITS)) as u8);
        let database_id = ((value >> DATABASE_SHIFT) & mask(DATABASE_BITS)) as u16;
        let worker_id = ((value >> WORKER_SHIFT) & mask(WORKER_BITS)) as u8;
        let time_millis = value >> TIME_SHIFT;
        Id {
            value,
            time_millis,
            worker_id,
            database_id,
            rotate,
            sequence,
        }
    }

    /// Absolute UTC timestamp this id was minted at.
    pub fn time(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.time_millis + EPOCH_MILLIS)
            .single()
            .expect("shard id time_millis out of range")
    }

    /// The rotated-table suffix this id's `rotate` class derives from its
    /// timestamp (leading underscore included, empty for `Rotate::None`).
    pub fn rotated_suffix(&self) -> String {
        let t = self.time();
        match self.rotate {
            Rotate::None => String::new(),
            Rotate::Monthly => format!("_{:04}{:02}", t.year(), t.month()),
            Rotate::Weekly => format!("_{:04}0{:02}", t.iso_week().year(), t.iso_week().week()),
            Rotate::Daily => format!("_{:04}{:02}{:02}", t.year(), t.month(), t.day()),
        }
    }
}
