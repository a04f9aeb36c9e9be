mod cedi;
pub mod op;
mod secret;

pub use cedi::{Cedi, CediConversionError, GHS_CURRENCY_CODE};
pub use secret::Secret;
