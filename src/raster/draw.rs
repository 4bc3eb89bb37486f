//! Polyline rasterization onto a color composite

use super::{ColorRaster, Contour, Point, Rgb};

fn stamp(raster: &mut ColorRaster, x: i32, y: i32, color: Rgb, thickness: u32) {
    let reach = (thickness.max(1) as i32 - 1) / 2;
    for sy in y - reach..=y + reach {
        for sx in x - reach..=x + reach {
            if sx >= 0 && sy >= 0 && (sx as usize) < raster.width() && (sy as usize) < raster.height()
            {
                raster.set(sx as usize, sy as usize, color);
            }
        }
    }
}

/// Bresenham line between two points, clipped to the raster
fn draw_line(raster: &mut ColorRaster, a: Point, b: Point, color: Rgb, thickness: u32) {
    let (mut x, mut y) = (a.x, a.y);
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(raster, x, y, color, thickness);
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Draw a polyline, closing it back to the first point when `closed`
pub fn draw_polyline(
    raster: &mut ColorRaster,
    points: &[Point],
    closed: bool,
    color: Rgb,
    thickness: u32,
) {
    match points {
        [] => {}
        [p] => stamp(raster, p.x, p.y, color, thickness),
        _ => {
            for w in points.windows(2) {
                draw_line(raster, w[0], w[1], color, thickness);
            }
            if closed {
                draw_line(raster, points[points.len() - 1], points[0], color, thickness);
            }
        }
    }
}

/// Outline every contour, no fill
pub fn draw_contours(raster: &mut ColorRaster, contours: &[Contour], color: Rgb, thickness: u32) {
    for contour in contours {
        draw_polyline(raster, &contour.points, true, color, thickness);
    }
}
