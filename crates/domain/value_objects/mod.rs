pub mod enums;
pub mod invoices;
pub mod tripay_callback;
