pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod filter;
pub mod slug;
pub mod validation;
pub mod variant;
