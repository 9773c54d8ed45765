use ava_resource::manifest::{ClickMode, ClickPadding};
use image::math::Rect;

/// Picks the window-local point to click inside a matched rect.
///
/// The rect first shrinks by the fractional padding on each edge, floored
/// at one pixel so the target never collapses. `Center` takes the integer
/// midpoint of the shrunk rect; `Random` samples a pixel inside it.
pub fn resolve_click_point(rect: Rect, mode: ClickMode, padding: ClickPadding) -> (u32, u32) {
    let inset_left = (rect.width as f32 * padding.left) as u32;
    let inset_right = (rect.width as f32 * padding.right) as u32;
    let inset_top = (rect.height as f32 * padding.top) as u32;
    let inset_bottom = (rect.height as f32 * padding.bottom) as u32;

    let x = rect.x + inset_left;
    let y = rect.y + inset_top;
    let width = rect.width.saturating_sub(inset_left + inset_right).max(1);
    let height = rect.height.saturating_sub(inset_top + inset_bottom).max(1);

    match mode {
        ClickMode::Center => (x + width / 2, y + height / 2),
        ClickMode::Random => (
            x + rand::random::<u32>() % width,
            y + rand::random::<u32>() % height,
        ),
    }
}
