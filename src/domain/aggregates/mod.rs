//! Aggregates module
pub mod attribute;
pub mod comment;
pub mod customer;
pub mod media;
pub mod product;
pub mod store;
pub mod user;
pub mod variant;

pub use attribute::ProductAttribute;
pub use comment::{Comment, MAX_RATING};
pub use customer::Customer;
pub use media::{ImageType, ProductImage};
pub use product::{trash_cutoff, NewProduct, Product, ProductError, ProductRecord, ProductStatus};
pub use store::{Store, StoreImage, StoreImageType};
pub use user::{ProfileImage, Role, User, UserLocation, UserStatus};
pub use variant::{Inventory, ProductVariant};
