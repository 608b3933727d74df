mod resolve;

pub use resolve::{ResolveError, Resolver};
