//! Which widgets render on a product page.
//!
//! Widgets linked to the product win outright and all of them render.
//! Otherwise a single universal widget renders: the newest one, with the
//! widget id as tie-breaker so the choice never depends on storage order.

use std::cmp::Ordering;

use crate::commerce::Product;
use crate::widget::Widget;

/// Published, not deleted, and owned by the product's seller.
pub fn is_live(widget: &Widget, product: &Product) -> bool {
    widget.published && !widget.is_deleted() && widget.seller_id == product.seller_id
}

/// Product-specific widget linking this product.
pub fn targets_product(widget: &Widget, product: &Product) -> bool {
    widget.scope.links(&product.id)
}

/// Widget with no product list, eligible on every product page.
pub fn is_universal(widget: &Widget) -> bool {
    widget.is_universal()
}

/// Newest first, then by id.
fn newest_first(a: &&Widget, b: &&Widget) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Select the widgets to render for `product` from its owner's widget set.
///
/// An empty result is a normal outcome: nothing renders.
pub fn select<'a>(product: &Product, owner_widgets: &'a [Widget]) -> Vec<&'a Widget> {
    let live: Vec<&Widget> = owner_widgets
        .iter()
        .filter(|w| is_live(w, product))
        .collect();

    let mut specific: Vec<&Widget> = live
        .iter()
        .copied()
        .filter(|w| targets_product(w, product))
        .collect();
    if !specific.is_empty() {
        specific.sort_by(newest_first);
        return specific;
    }

    live.into_iter()
        .filter(|w| is_universal(w))
        .min_by(newest_first)
        .into_iter()
        .collect()
}
