pub mod product;
pub mod pricing;
pub mod bundle;
pub mod inventory;
pub mod homepage;

pub use product::{Product, ProductInput, ProductSummary, ProductError};
pub use pricing::{DiscountType, Savings};
pub use bundle::{Bundle, BundleItem, BundleSlot, BundleType, BundlePrice, BundleSelection, BundleError};
pub use inventory::{StockLedger, StockAdjustments, InventoryError};
pub use homepage::{HomepageSection, SectionKind, Homepage};
