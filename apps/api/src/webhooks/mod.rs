// Internal webhook surface called back by the external workers.

pub mod callbacks;
pub mod commands;
pub mod handlers;
