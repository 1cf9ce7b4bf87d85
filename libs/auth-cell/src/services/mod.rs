pub mod account;
pub mod otp;
pub mod phone;
