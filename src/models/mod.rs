//! Data models for the SkillSwap application.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod message;
mod notification;
mod profile;
mod rating;
mod skill;
mod swap;

pub use message::*;
pub use notification::*;
pub use profile::*;
pub use rating::*;
pub use skill::*;
pub use swap::*;
