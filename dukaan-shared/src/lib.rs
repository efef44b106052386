pub mod models;
pub mod money;
pub mod pii;

pub use money::format_amount;
pub use pii::Masked;
pub mod validation;

pub use validation::ValidationErrors;
