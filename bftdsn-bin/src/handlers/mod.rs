mod handle_deal;
mod handle_decode;
mod handle_encode;
mod handle_retrieve;

pub use handle_deal::handle_deal_command;
pub use handle_decode::handle_decode_command;
pub use handle_encode::handle_encode_command;
pub use handle_retrieve::handle_retrieve_command;
