mod plan;
mod refresh;
mod show;

pub use plan::cmd_plan;
pub use refresh::cmd_refresh;
pub use show::cmd_show;
