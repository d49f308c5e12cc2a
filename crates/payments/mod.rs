pub mod signature;
pub mod tripay_client;
