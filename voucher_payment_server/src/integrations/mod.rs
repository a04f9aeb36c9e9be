pub mod arkesel;
pub mod moolre;

pub use arkesel::SmsClient;
pub use moolre::{MoolreClient, PaymentGateway, PaymentStatus, ProviderError};
#[cfg(test)]
pub use moolre::MockPaymentGateway;
