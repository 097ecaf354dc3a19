pub mod service;

pub use service::{PlayerService, PlayerServiceApi, ServerCheck};
