pub mod login;
pub mod notification;

pub use login::{AdaptiveLoginRequest, AdaptiveLoginResult, GeolocationResult, LocationSummary};
pub use notification::{NotifyRequest, NotifyResult};
