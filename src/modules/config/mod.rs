pub mod commands;

use crate::modules::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "config",
        },
        commands: vec![commands::modlog()],
        event_handlers: vec![],
    }
}
