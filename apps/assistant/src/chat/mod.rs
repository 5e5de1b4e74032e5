pub mod handlers;
pub mod history;
pub mod prompts;
pub mod replies;
pub mod turn;
