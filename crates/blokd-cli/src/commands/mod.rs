pub mod block;
pub mod daemon;
pub mod history;
