//! Box annotation
//!
//! Draws detection outlines straight into an `image::RgbImage` built over the
//! frame's pixels. Labels are returned as text alongside the frame.

use bytes::Bytes;
use contracts::{BoundingBox, ContractError, Frame};
use image::{Rgb, RgbImage};

/// Outline thickness in pixels
const LINE_WIDTH: u32 = 2;

/// Label shown for a retained detection, e.g. `red (90%)`
pub fn label(class_name: &str, score: f32) -> String {
    format!("{} ({:.0}%)", class_name, score * 100.0)
}

/// Draw `boxes` over a copy of `frame`
pub fn draw_boxes(frame: &Frame, boxes: &[(BoundingBox, [u8; 3])]) -> Result<Frame, ContractError> {
    if boxes.is_empty() {
        return Ok(frame.clone());
    }

    let mut img = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec()).ok_or_else(
        || ContractError::InvalidFrame {
            message: format!("buffer does not match {}x{}", frame.width, frame.height),
        },
    )?;

    for (bbox, color) in boxes {
        draw_rect(&mut img, bbox, Rgb(*color));
    }

    Ok(Frame {
        width: frame.width,
        height: frame.height,
        data: Bytes::from(img.into_raw()),
    })
}

fn draw_rect(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(width - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(height - 1);

    let (x0, x1) = (clamp_x(bbox.xmin), clamp_x(bbox.xmax));
    let (y0, y1) = (clamp_y(bbox.ymin), clamp_y(bbox.ymax));
    if x0 > x1 || y0 > y1 {
        return;
    }

    for t in 0..LINE_WIDTH {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            img.put_pixel(x, top, color);
            img.put_pixel(x, bottom, color);
        }
        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            img.put_pixel(left, y, color);
            img.put_pixel(right, y, color);
        }
    }
}
