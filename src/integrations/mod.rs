//! External collaborators: the LLM summary endpoint and Postgres.

pub mod summary {
    pub use crate::summary::*;
}

pub mod circuit_breaker {
    pub use crate::circuit_breaker::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}
