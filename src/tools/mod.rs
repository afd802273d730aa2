pub mod extract;
pub mod fetch;
pub mod search;
pub mod vector_math;
