pub mod beam;
pub mod compositor;
pub mod config;
pub mod consts;
pub mod error;
pub mod filters;
pub mod frame;
pub mod io;
pub mod library;
pub mod simulator;
pub mod state;
pub mod viewport;
