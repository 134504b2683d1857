//! Catalog browsing commands.
//!
//! # Usage
//!
//! ```bash
//! # Search with filters
//! lavande products --search "ao khoac" --price-min 100000 --price-max 500000
//!
//! # One product in full
//! lavande product 64f1c2a9e5b0aa0012345678
//! ```
//!
//! Catalog reads are anonymous; no session is required.

use std::fmt::Write as _;

use lavande_client::api::ApiError;
use lavande_client::api::catalog::ProductQuery;
use lavande_client::api::types::Product;
use lavande_core::ProductId;

use super::CommandContext;

/// List products matching the query.
pub async fn products(ctx: &CommandContext, query: &ProductQuery) -> Result<(), ApiError> {
    let products = ctx.api.products(query).await?;

    if products.is_empty() {
        tracing::info!("No products matched");
        return Ok(());
    }

    tracing::info!("{} product(s):", products.len());
    for (index, product) in products.iter().enumerate() {
        tracing::info!("  {}. {}", index + 1, summary_line(product));
    }
    Ok(())
}

/// Show one product in full.
pub async fn product(ctx: &CommandContext, id: &str) -> Result<(), ApiError> {
    let product = ctx.api.product(&ProductId::new(id)).await?;

    tracing::info!("{}", product.title);
    tracing::info!("  Price: {}", product.price);
    if let Some(rating) = product.avg_review {
        tracing::info!("  Rating: {:.1}/5", rating);
    }
    if let Some(category) = &product.category
        && let Some(name) = category.name.as_deref()
    {
        tracing::info!("  Category: {}", name);
    }
    if !product.sizes.is_empty() {
        let sizes = product
            .sizes
            .iter()
            .map(|stock| format!("{} ({} left)", stock.size, stock.quantity))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!("  Sizes: {}", sizes);
    }
    if let Some(img) = product.img.as_deref() {
        tracing::info!("  Image: {}", img);
    }
    if let Some(description) = product.description.as_deref() {
        tracing::info!("  {}", description);
    }
    Ok(())
}

/// Show the highest-rated products.
pub async fn top_rated(ctx: &CommandContext) -> Result<(), ApiError> {
    let products = ctx.api.top_rated().await?;

    if products.is_empty() {
        tracing::info!("No rated products yet");
        return Ok(());
    }

    tracing::info!("Top rated:");
    for product in &products {
        tracing::info!("  {}", summary_line(product));
    }
    Ok(())
}

/// One-line product rendering shared by the list commands.
fn summary_line(product: &Product) -> String {
    let mut line = format!("{} - {}", product.title, product.price);
    if let Some(rating) = product.avg_review {
        let _ = write!(line, " - {rating:.1}/5");
    }
    let _ = write!(line, " ({})", product.id);
    line
}
