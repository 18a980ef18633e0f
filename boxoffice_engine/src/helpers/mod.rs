mod order_code;
mod redemption_code;

pub use order_code::{new_order_code, payment_reference, ticket_serial, ORDER_CODE_PREFIX};
pub use redemption_code::{CodeSigner, RedemptionClaims, RedemptionCodeError};
