pub mod types;

pub use types::{days_until, Observation, Urgency};
