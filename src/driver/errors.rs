use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("processing of {} was cancelled", file.display())]
    Cancelled { file: PathBuf },
}
