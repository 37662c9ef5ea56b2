use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is at capacity ({max_size} items)")]
    AtCapacity { max_size: usize },

    #[error("item {0} not found")]
    NotFound(String),

    #[error("item {0} is already in a terminal state")]
    AlreadyTerminal(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
