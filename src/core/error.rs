use thiserror::Error;

use super::session::Stage;

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("'{action}' is not valid in the {stage} stage")]
    InvalidStage { action: &'static str, stage: Stage },

    #[error("operative name must not be empty")]
    NameRequired,

    #[error("a generation request is already pending")]
    RequestPending,

    #[error("no generation request is pending")]
    NoRequestPending,

    #[error("result belongs to an earlier session")]
    StaleResult,
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("story node is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("story node must carry exactly 2 options, got {0}")]
    OptionCount(usize),

    #[error("story node narrative is empty")]
    EmptyNarrative,
}

pub type Result<T> = std::result::Result<T, SessionError>;
