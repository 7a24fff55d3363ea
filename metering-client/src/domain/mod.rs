pub mod group;
pub mod meter;
pub mod reading;

pub use group::Group;
pub use meter::{Meter, MeterType};
pub use reading::{InvalidInterval, Reading};
