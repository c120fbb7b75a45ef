pub mod checkout_data;
pub mod cleanup;
pub mod completion;
pub mod gateways;
pub mod identity;
pub mod order_poll;
pub mod screen;
pub mod url_state;
