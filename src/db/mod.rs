mod repository;
mod schema;

pub use repository::Repository;

#[cfg(test)]
pub(crate) use repository::tests as test_support;
