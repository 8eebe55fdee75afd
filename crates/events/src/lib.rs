//! Event Bus & Logger: a multi-producer multi-consumer bus where emitters
//! publish `{topic, payload}` pairs, plus a `tracing`-based logging
//! bootstrap. Slow subscribers never block producers — they see only the
//! latest snapshot per topic on the `watch` side, or an in-order but
//! possibly-lagged log on the `broadcast` side.

mod bus;
mod logger;
mod model;

pub use bus::EventBus;
pub use logger::init_logging;
pub use model::{Event, Payload, Topic};
