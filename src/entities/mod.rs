pub mod prelude;

pub mod students;
