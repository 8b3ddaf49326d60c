pub mod commands;
pub mod events;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "filtering",
        },
        commands: vec![commands::invites()],
        event_handlers: vec![events::handler],
    }
}
