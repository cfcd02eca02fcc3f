use image::{Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_filled_rect_mut},
    rect::Rect,
};

// Module shapes. Every shape stays inside its `size` x `size` cell.
//------------------------------------------------------------------------------

pub fn square(img: &mut RgbaImage, x: u32, y: u32, size: u32, clr: Rgba<u8>) {
    if size == 0 {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(x as i32, y as i32).of_size(size, size), clr);
}

pub fn dot(img: &mut RgbaImage, x: u32, y: u32, size: u32, clr: Rgba<u8>) {
    let center = (size / 2) as i32;
    let radius = ((size as f32 * 0.4) as i32).min(size as i32 - 1 - center);
    draw_filled_circle_mut(img, (x as i32 + center, y as i32 + center), radius, clr);
}

pub fn rounded_square(img: &mut RgbaImage, x: u32, y: u32, size: u32, clr: Rgba<u8>) {
    let r = size / 4;
    if r == 0 || size <= 2 * r {
        return square(img, x, y, size, clr);
    }
    draw_filled_rect_mut(img, Rect::at((x + r) as i32, y as i32).of_size(size - 2 * r, size), clr);
    draw_filled_rect_mut(img, Rect::at(x as i32, (y + r) as i32).of_size(size, size - 2 * r), clr);

    let (x, y, r) = (x as i32, y as i32, r as i32);
    let far = size as i32 - 1 - r;
    for (cx, cy) in [(r, r), (far, r), (r, far), (far, far)] {
        draw_filled_circle_mut(img, (x + cx, y + cy), r, clr);
    }
}
