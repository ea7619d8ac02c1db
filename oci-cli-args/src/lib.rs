// Subcommands that are specified in https://github.com/opencontainers/runtime-tools/blob/master/docs/command-line-interface.md

mod checkpoint;
mod create;
mod delete;
mod events;
mod exec;
mod features;
mod kill;
mod list;
mod pause;
mod ps;
mod restore;
mod resume;
mod run;
mod start;
mod state;

pub use checkpoint::Checkpoint;
pub use create::Create;
pub use delete::Delete;
pub use events::Events;
pub use exec::Exec;
pub use features::Features;
pub use kill::Kill;
pub use list::List;
pub use pause::Pause;
pub use ps::Ps;
pub use restore::Restore;
pub use resume::Resume;
pub use run::Run;
pub use start::Start;
pub use state::State;
