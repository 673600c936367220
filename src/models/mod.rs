//! Product data model and its storage encoding.

pub mod image_list;
pub mod product;

pub use product::{NewProduct, Product, ProductUpdate};
