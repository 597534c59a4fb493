use std::cell::{BorrowError, BorrowMutError};

use crate::proc::FileDescriptor;

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable errors returned by filesystem operations.
///
/// Resource exhaustion and over-free conditions are not represented here;
/// those abort.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Cannot open this file type: {0}")]
    WrongFileType(String),

    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Path is empty")]
    EmptyPath,

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Directory is in use: {0}")]
    Busy(String),

    #[error("File is closed")]
    FileClosed,

    #[error("End of file")]
    EndOfFile,

    #[error("Invalid file offset: {0}")]
    InvalidOffset(i64),

    #[error("Write would exceed maximum file size at byte {0}")]
    FileTooLarge(u64),

    #[error("File descriptor not found: {0}")]
    DescriptorNotFound(FileDescriptor),

    #[error("Global state is not initialized")]
    NotInitialized,

    #[error("Process state predates the current global state")]
    StaleProcess,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Object being modified: {0}")]
    Borrow(String),
}

impl Error {
    pub fn path_not_found<P: AsRef<str>>(path: P) -> Self {
        Error::PathNotFound(path.as_ref().to_string())
    }

    pub fn not_a_directory<P: AsRef<str>>(path: P) -> Self {
        Error::NotADirectory(path.as_ref().to_string())
    }

    pub fn wrong_file_type<P: AsRef<str>>(path: P) -> Self {
        Error::WrongFileType(path.as_ref().to_string())
    }

    pub fn already_exists<P: AsRef<str>>(path: P) -> Self {
        Error::AlreadyExists(path.as_ref().to_string())
    }

    pub fn directory_not_empty<P: AsRef<str>>(path: P) -> Self {
        Error::DirectoryNotEmpty(path.as_ref().to_string())
    }

    pub fn busy<P: AsRef<str>>(path: P) -> Self {
        Error::Busy(path.as_ref().to_string())
    }

    pub fn empty_path() -> Self {
        Error::EmptyPath
    }
}

impl From<BorrowMutError> for Error {
    fn from(err: BorrowMutError) -> Error {
        Error::Borrow(err.to_string())
    }
}

impl From<BorrowError> for Error {
    fn from(err: BorrowError) -> Error {
        Error::Borrow(err.to_string())
    }
}
