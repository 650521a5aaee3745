mod repository;

pub use repository::Storage;
