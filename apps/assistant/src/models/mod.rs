pub mod category;
pub mod chat;
pub mod lenient;
pub mod record;
