//! Tray icon generation.
//!
//! Icons are drawn procedurally so the binary carries no image assets: a
//! filled status disc (red while the gate is closed, green while the mic
//! is open) with a small microphone glyph, plus a strike-through when
//! gated.

use tray_icon::Icon;

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

/// Icon shown while the mic is open (gate active).
pub fn open_icon() -> Result<Icon, String> {
    let rgba = draw_status_disc(false);
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| e.to_string())
}

/// Icon shown while the mic is gated (muted or volume-zeroed).
pub fn gated_icon() -> Result<Icon, String> {
    let rgba = draw_status_disc(true);
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| e.to_string())
}

fn draw_status_disc(gated: bool) -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];

    let center = size as f32 / 2.0;
    let radius = center - 2.0;
    let (r, g, b) = if gated {
        (205u8, 52u8, 52u8)
    } else {
        (52u8, 175u8, 80u8)
    };

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let dist = (dx * dx + dy * dy).sqrt();

            let alpha = if dist < radius {
                255
            } else if dist < radius + 1.0 {
                // Anti-aliased rim
                ((radius + 1.0 - dist) * 255.0) as u8
            } else {
                0
            };

            let idx = (y * size + x) * 4;
            rgba[idx] = r;
            rgba[idx + 1] = g;
            rgba[idx + 2] = b;
            rgba[idx + 3] = alpha;
        }
    }

    draw_mic_glyph(&mut rgba, size);
    if gated {
        draw_strike(&mut rgba, size);
    }

    rgba
}

/// Capsule-shaped mic body with a short stand.
fn draw_mic_glyph(rgba: &mut [u8], size: usize) {
    let cx = size / 2;
    let width = size / 5;
    let top = size / 4;
    let bottom = size - size / 3;

    for y in top..bottom {
        for x in (cx - width / 2)..=(cx + width / 2) {
            paint_white(rgba, size, x, y);
        }
    }
    for y in bottom..(bottom + size / 8) {
        paint_white(rgba, size, cx, y);
    }
}

/// Diagonal line across the disc.
fn draw_strike(rgba: &mut [u8], size: usize) {
    for i in 5..(size - 5) {
        for t in 0..2 {
            paint_white(rgba, size, i, i + t);
        }
    }
}

fn paint_white(rgba: &mut [u8], size: usize, x: usize, y: usize) {
    if x >= size || y >= size {
        return;
    }
    let idx = (y * size + x) * 4;
    // Only paint inside the disc.
    if rgba[idx + 3] > 0 {
        rgba[idx] = 245;
        rgba[idx + 1] = 245;
        rgba[idx + 2] = 245;
        rgba[idx + 3] = 255;
    }
}
