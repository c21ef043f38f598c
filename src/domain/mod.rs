//! Domain model: value objects, entities and the storage ports the
//! application layer depends on.

pub mod coupon;
pub mod money;
pub mod notification;
pub mod order;
pub mod payment_code;
pub mod ports;
