use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("{container} has no field named '{field}'")]
    UnknownField { container: String, field: String },

    #[error("Field '{field}' does not hold a {expected} (it holds a {found})")]
    WrongKind {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{container} declares the field '{field}' more than once")]
    DuplicateField { container: String, field: String },

    #[error("{container} field '{field}' has a mutable default value that would be shared between instances; use a default factory instead")]
    SharedDefault { container: String, field: String },

    #[error("Expected a {expected} record, but got a {found}")]
    SchemaMismatch { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, ContainerError>;
