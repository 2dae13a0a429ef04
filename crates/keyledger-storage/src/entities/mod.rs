pub mod employees;
pub mod keys;
pub mod transactions;

pub use employees::Entity as Employees;
pub use keys::Entity as Keys;
pub use transactions::Entity as Transactions;
