//! Row IDs for targets, checks, rules and users: Snowflake strings seeded
//! from the server's configured machine/node identity.

use snowflake::SnowflakeIdBucket;
use std::sync::{Mutex, OnceLock};

static ID_GENERATOR: OnceLock<Mutex<SnowflakeIdBucket>> = OnceLock::new();

/// Snowflake machine and node identifiers are 5 bits each.
const ID_BITS_MAX: i32 = 31;

/// Seed the generator with the identity from server config. Values outside
/// 0-31 are clamped. Only the first call takes effect; `next_id` before any
/// seeding runs with identity (0, 0).
pub fn init(machine_id: i32, node_id: i32) {
    let _ = ID_GENERATOR.set(Mutex::new(SnowflakeIdBucket::new(
        machine_id.clamp(0, ID_BITS_MAX),
        node_id.clamp(0, ID_BITS_MAX),
    )));
}

/// A fresh process-unique string ID for a new row.
pub fn next_id() -> String {
    let bucket = ID_GENERATOR.get_or_init(|| Mutex::new(SnowflakeIdBucket::new(0, 0)));
    bucket.lock().unwrap().get_id().to_string()
}
