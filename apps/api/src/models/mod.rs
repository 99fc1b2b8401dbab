pub mod analysis;
pub mod cards;
pub mod user;
