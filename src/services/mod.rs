pub mod image_service;
pub mod portfolio_service;

pub use image_service::{ImageResult, ImageSearchError, ImageService};
pub use portfolio_service::{Portfolio, PortfolioService};
