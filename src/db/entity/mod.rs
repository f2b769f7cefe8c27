pub mod member;

pub use member::Entity as Member;
