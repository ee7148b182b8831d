pub mod handlers;
pub mod linkedin;
