pub mod consumption;
pub mod doctor;
pub mod enums;
pub mod filters;
pub mod patient;
pub mod schedule;
pub mod user;

pub use consumption::*;
pub use doctor::*;
pub use filters::*;
pub use patient::*;
pub use schedule::*;
pub use user::*;
