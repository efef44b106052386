pub mod models;
pub mod coupon;
pub mod cart;
pub mod shipping;
pub mod manager;
pub mod invoice;

pub use models::{
    CheckoutRequest, CustomerInfo, Order, OrderItem, OrderItemType, OrderStatus, PaymentMethod,
    PaymentStatus, ShippingAddress,
};
pub use coupon::{Coupon, CouponError, CouponInput};
pub use cart::{AppliedCoupon, Cart, CartError, CartLine, CartPricer, CatalogSnapshot, LineComponent, LineKind, PricedCart, PricedLine};
pub use shipping::ShippingPolicy;
pub use manager::{OrderError, OrderManager, PreparedOrder, StatusChange};
pub use invoice::{Invoice, ShopProfile};
