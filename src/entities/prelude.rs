pub use super::students::Entity as Students;
