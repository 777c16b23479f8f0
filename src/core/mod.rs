// Scoring domain: normalization, scoring and the legacy field mapping
pub mod status {
    pub use crate::status::*;
}

pub mod parsers {
    pub use crate::parsers::*;
}

pub mod lead_normalizer {
    pub use crate::lead_normalizer::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod legacy {
    pub use crate::legacy::*;
}

pub mod errors {
    pub use crate::errors::*;
}
