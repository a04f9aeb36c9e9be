mod phone;

pub use phone::{display_local, normalize_msisdn};
