pub mod bridge;
pub mod engine;
pub mod forecast;
pub mod margins;
pub mod report;
pub mod sensitivity;
pub mod wacc;
