//! Database models split into domain-specific modules.

pub mod application;
pub mod common;
pub mod organization;
pub mod staff_application;
pub mod user;

pub use application::*;
pub use common::*;
pub use organization::*;
pub use staff_application::*;
pub use user::*;
