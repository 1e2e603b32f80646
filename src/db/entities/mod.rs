//! SeaORM entities mapping to the dashboard's database tables.

pub mod admin_user;
pub mod bot;
pub mod bot_group;
pub mod bot_log;
pub mod message_log;
pub mod user;
