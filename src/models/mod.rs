pub mod form;
pub mod review;
pub mod subscriber;

pub use form::*;
pub use review::*;
pub use subscriber::*;
