pub mod ab;
pub mod choose;
pub mod clean;
pub mod help;
pub mod poll;
