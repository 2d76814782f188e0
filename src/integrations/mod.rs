//! External source integrations.

pub mod services {
    pub use crate::services::*;
}

pub mod portal {
    pub use crate::portal::*;
}
