pub mod format;
pub mod queue;
pub mod track;
pub mod trigger;
