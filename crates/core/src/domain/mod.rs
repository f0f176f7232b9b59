pub mod contact;
pub mod intent;
pub mod order;
pub mod policy;
pub mod session;
