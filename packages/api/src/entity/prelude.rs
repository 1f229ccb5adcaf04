pub use super::goal::Entity as Goal;
pub use super::sale::Entity as Sale;
pub use super::seller::Entity as Seller;
pub use super::user::Entity as User;
