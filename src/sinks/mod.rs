pub mod collecting;
pub mod trace;
