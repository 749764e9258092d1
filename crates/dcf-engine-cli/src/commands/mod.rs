pub mod drivers;
pub mod model;
pub mod valuation;
