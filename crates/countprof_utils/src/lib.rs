pub mod clock;
pub mod logger;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use logger::init_logging;
