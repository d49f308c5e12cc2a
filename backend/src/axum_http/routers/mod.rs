pub mod tripay_callback;
