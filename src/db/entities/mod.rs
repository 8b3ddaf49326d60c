pub mod filter_lists;
pub mod filters;
pub mod guild_configs;
pub mod infractions;
