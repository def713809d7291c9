//! MIME boundary tokens

use rand::{distributions::Alphanumeric, Rng};

#[cfg(test)]
use mockall::mock;

/// The length of a generated boundary token
pub const BOUNDARY_LENGTH: usize = 16;

/// Source of multipart boundary tokens.
///
/// A token only has to be unlikely to appear inside the message content; it does
/// not need to be cryptographically secure.
pub trait BoundaryGenerator: Send + Sync {
    /// Generate a new boundary token
    fn generate(&self) -> String;
}

#[cfg(test)]
mock! {
    pub BoundaryGenerator {}

    impl BoundaryGenerator for BoundaryGenerator {
        fn generate(&self) -> String;
    }
}

/// Random alphanumeric tokens of [`BOUNDARY_LENGTH`] characters
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomBoundary;

impl BoundaryGenerator for RandomBoundary {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LENGTH)
            .map(char::from)
            .collect()
    }
}
