// Domain-layer modules and shared errors/models
pub mod dispatcher {
    pub use crate::dispatcher::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod rate_limiter {
    pub use crate::rate_limiter::*;
}

pub mod validator {
    pub use crate::validator::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
