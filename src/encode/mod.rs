pub mod events;
pub mod wav;
