pub mod commands;
pub mod duration_parser;

use crate::modules::{Module, ModuleDefinition};
use commands::{apply, history, pardon};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "infractions",
        },
        commands: vec![
            apply::ban(),
            apply::kick(),
            apply::timeout(),
            apply::voicemute(),
            apply::warn(),
            apply::note(),
            pardon::pardon(),
            history::history(),
        ],
        event_handlers: vec![],
    }
}
