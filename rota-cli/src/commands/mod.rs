//! CLI command implementations

pub mod pr;
pub mod session;
pub mod team;
pub mod user;

pub use pr::PrArgs;
pub use team::TeamArgs;
pub use user::UserArgs;
