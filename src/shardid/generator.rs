//! Monotonic shard-id generator with clock-backwards tolerance and
//! per-database round robin.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::warn;

use super::id::{Id, Rotate, MAX_SEQUENCE};

/// A clock abstraction so tests can pin time deterministically.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

struct State {
    last_millis: i64,
    next_sequence: u16,
    next_database_id: u16,
}

/// Generates strictly increasing [`Id`]s for one `(worker, database-range)`
/// stream.
///
/// `SQLGRID_WORKER_ID` is read at construction time as a fallback when no
/// explicit worker id is supplied, mirroring the original source's
/// environment-variable worker-id acquisition.
pub struct Generator {
    worker_id: u8,
    database_count: u16,
    rotate: Rotate,
    clock: Clock,
    state: Mutex<State>,
}

impl Generator {
    /// Creates a generator for `worker_id`, round-robining across
    /// `database_count` databases (0 or 1 disables round robin — every id
    /// gets `database_id = 0`).
    pub fn new(worker_id: u8, database_count: u16, rotate: Rotate) -> Generator {
        Generator {
            worker_id,
            database_count,
            rotate,
            clock: Arc::new(Utc::now),
            state: Mutex::new(State {
                last_millis: 0,
                next_sequence: 0,
                next_database_id: 0,
            }),
        }
    }

    /// Resolves a worker id from `SQLGRID_WORKER_ID`, falling back to 0 if
    /// unset or unparsable.
    pub fn worker_id_from_env() -> u8 {
        std::env::var("SQLGRID_WORKER_ID")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(0)
    }

    /// Overrides the clock function; intended for tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn database_id(&self, state: &mut State) -> u16 {
        if self.database_count > 1 {
            let id = state.next_database_id;
            state.next_database_id = (state.next_database_id + 1) % self.database_count;
            id
        } else {
            0
        }
    }

    /// Mints the next id in this generator's stream.
    pub fn next(&self) -> Id {
        let mut state = self.state.lock().unwrap();
        let mut now = (self.clock)().timestamp_millis();

        if now < state.last_millis {
            warn!(
                last = state.last_millis,
                now, "clock moved backwards, absorbing via sequence/spin"
            );
            if state.next_sequence > MAX_SEQUENCE {
                while now <= state.last_millis {
                    now = (self.clock)().timestamp_millis();
                }
                state.next_sequence = 0;
            } else {
                now = state.last_millis + 1;
            }
        }

        if state.next_sequence > MAX_SEQUENCE {
            if now == state.last_millis {
                let target = state.last_millis;
                while now <= target {
                    now = (self.clock)().timestamp_millis();
                }
            }
            state.next_sequence = 0;
        }

        state.last_millis = now;
        let sequence = state.next_sequence;
        let database_id = self.database_id(&mut state);
        state.next_sequence += 1;

        let time = DateTime::<Utc>::from_timestamp_millis(now).expect("valid timestamp");
        Id::build(time, self.worker_id, database_id, self.rotate, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use chrono::TimeZone;

    fn pinned_clock(millis: i64) -> Clock {
        Arc::new(move || Utc.timestamp_millis_opt(millis).single().unwrap())
    }

    #[test]
    fn sequence_increments_under_a_pinned_clock() {
        let pinned = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        let gen = Generator::new(0, 0, Rotate::None)
            .with_clock(pinned_clock(pinned.timestamp_millis()));

        let a = gen.next();
        let b = gen.next();
        let c = gen.next();

        assert_eq!((a.sequence, b.sequence, c.sequence), (0, 1, 2));
        assert_eq!(a.worker_id, b.worker_id);
        assert_eq!(a.database_id, b.database_id);
        assert_eq!(a.time_millis, b.time_millis);
        assert_eq!(b.time_millis, c.time_millis);
    }

    #[test]
    fn ids_are_strictly_monotonically_increasing() {
        let counter = Arc::new(AtomicI64::new(
            Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap().timestamp_millis(),
        ));
        let c = counter.clone();
        let clock: Clock = Arc::new(move || {
            let millis = c.fetch_add(0, Ordering::SeqCst);
            Utc.timestamp_millis_opt(millis).single().unwrap()
        });
        let gen = Generator::new(1, 4, Rotate::None).with_clock(clock);

        let mut prev = gen.next().value;
        for _ in 0..2048 {
            counter.fetch_add(1, Ordering::SeqCst);
            let id = gen.next();
            assert!(id.value > prev);
            prev = id.value;
        }
    }

    #[test]
    fn round_robins_database_ids() {
        let pinned = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        let gen =
            Generator::new(0, 3, Rotate::None).with_clock(pinned_clock(pinned.timestamp_millis()));
        let ids: Vec<u16> = (0..6).map(|_| gen.next().database_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2]);
    }
}
