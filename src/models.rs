pub mod channel;
pub mod contact;
pub mod conversation;
pub mod message;
pub mod webhook;
