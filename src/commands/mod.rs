pub mod infractions;
pub mod moderation;
pub mod setup;
