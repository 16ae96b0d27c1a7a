//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;
pub mod blog;

pub type ProductId = i64;
pub type OrderId = i64;
pub type UserId = i64;

pub use product::{adjusted_stock, ImageRef, Product, ProductDraft, ProductPatch, StockDirection};
pub use order::{NewOrder, Order, OrderError, OrderItem, OrderStatus, StatusPatch};
pub use cart::{Cart, CartError, CartLine, OrderPayload, PayloadItem};
pub use user::{BlockPatch, NewUser, ProfilePatch, ProfileUpdate, RawUser, Role, Signup, User, UserPatch};
pub use blog::{BlogPost, BlogPostDraft, BlogPostId, BlogPostPayload};
