pub mod actions;
pub mod actor;
pub mod info;
pub mod lua_host;
pub mod phase;
pub mod physics;
pub mod scheduler;
pub mod slope;
