pub mod kome;
pub mod tmpfiles;
