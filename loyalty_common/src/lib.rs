mod order_number;
mod points;

pub mod helpers;
pub mod op;
mod secret;

pub use order_number::{luhn_checksum_valid, OrderNumber, OrderNumberError};
pub use points::{Points, PointsConversionError, POINTS_SCALE};
pub use secret::Secret;
