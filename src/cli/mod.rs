mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::run;
