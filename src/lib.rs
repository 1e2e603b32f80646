pub mod authflow;
pub mod db;
pub mod server;
pub mod services;
pub mod telegram;
pub mod web;
