pub mod predicate;
pub mod route;
pub mod resolver;

pub use predicate::{Predicate, TimeWindow};
pub use route::Route;
pub use resolver::RouterResolver;
