use rand::Rng;

use crate::db_types::OrderCode;

pub const ORDER_CODE_PREFIX: &str = "BXO";
const ORDER_CODE_LENGTH: usize = 8;
// Excludes 0, O, 1 and I
const ORDER_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn new_order_code() -> OrderCode {
    let mut rng = rand::thread_rng();
    let code = (0..ORDER_CODE_LENGTH)
        .map(|_| char::from(ORDER_CODE_ALPHABET[rng.gen_range(0..ORDER_CODE_ALPHABET.len())]))
        .collect::<String>();
    OrderCode(format!("{ORDER_CODE_PREFIX}{code}"))
}

/// The deterministic ticket serial for the `index`th (zero-based) unit of an order line.
pub fn ticket_serial(order_code: &OrderCode, order_line_id: i64, index: i64) -> String {
    format!("{order_code}-{order_line_id}-{}", index + 1)
}

/// A fresh transaction reference for a payment attempt against the order.
pub fn payment_reference(order_code: &OrderCode) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{order_code}-{suffix:08x}")
}
