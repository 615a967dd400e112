pub mod quote;
pub mod trip;
pub mod vehicle;
