mod infraction;
mod mute_record;

pub use infraction::{Infraction, InfractionKind};
pub use mute_record::MuteRecord;
