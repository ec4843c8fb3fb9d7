/// Errors returned by fallible construction and world-editing calls.
///
/// Solver phases never fail; these only cover caller-supplied input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("polygon needs between 3 and {max} non-degenerate vertices, got {got}")]
    InvalidPolygon { got: usize, max: usize },

    #[error("chain needs at least {min} vertices, got {got}")]
    InvalidChain { got: usize, min: usize },

    #[error("chain vertices {0} and {1} are too close together")]
    ChainVerticesTooClose(usize, usize),

    #[error("circle radius must be non-negative and finite, got {0}")]
    InvalidRadius(f64),

    #[error("density must be non-negative and finite, got {0}")]
    InvalidDensity(f64),

    #[error("{0} handle does not refer to a live object")]
    InvalidHandle(&'static str),

    #[error("the world is locked while a step is in progress")]
    WorldLocked,

    #[error("a joint cannot connect a body to itself")]
    SelfJoint,

    #[error("gear joints can only couple revolute or prismatic joints")]
    InvalidGearTarget,
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PhysicsError::InvalidPolygon { got: 2, max: 8 };
        assert_eq!(
            err.to_string(),
            "polygon needs between 3 and 8 non-degenerate vertices, got 2"
        );
        assert_eq!(
            PhysicsError::InvalidHandle("body").to_string(),
            "body handle does not refer to a live object"
        );
    }
}
