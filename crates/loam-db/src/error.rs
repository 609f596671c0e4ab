use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Log error: {0}")]
    Log(#[from] loam_log::LogError),

    #[error("Table error: {0}")]
    Table(#[from] loam_table::TableError),

    #[error("Util error: {0}")]
    Util(#[from] loam_util::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sequence number overflow")]
    SeqnoOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;
