pub mod core;
pub mod settings;
pub mod submissions;
pub mod sync;
