pub mod call;
pub mod callable;
pub mod health;
pub mod operator;
pub mod poll;
