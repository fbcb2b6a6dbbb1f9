mod state;

pub use state::AppState;

/// Request header naming the operator behind a mutation.
pub const OPERATOR_HEADER: &str = "x-operator";
