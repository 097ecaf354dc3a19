pub mod playback;
pub mod player;
