pub mod model;
pub mod training;
