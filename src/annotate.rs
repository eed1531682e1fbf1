//! Bounding-box and overlay rendering.
//!
//! Drawing happens directly on the RGB buffer of a cloned frame; the input
//! frame is never mutated. Boxes that overhang the frame are clipped before
//! drawing. Text uses a small built-in glyph set (digits, colon, dot), which
//! covers the confidence and clock overlays.

use chrono::Local;

use crate::detect::Detection;
use crate::frame::Frame;
use crate::PipelineConfig;

const GLYPH_WIDTH: u32 = 6;
const GLYPH_HEIGHT: u32 = 7;
const TIMESTAMP_ORIGIN: (u32, u32) = (8, 8);

#[derive(Clone, Copy, Debug)]
pub struct AnnotateOptions {
    pub draw_confidence: bool,
    pub draw_timestamp: bool,
}

impl From<&PipelineConfig> for AnnotateOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            draw_confidence: config.draw_confidence,
            draw_timestamp: config.draw_timestamp,
        }
    }
}

/// Fixed-style box renderer.
pub struct Annotator {
    box_color: [u8; 3],
    text_color: [u8; 3],
    stroke: u32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            box_color: [0, 210, 90],
            text_color: [255, 255, 255],
            stroke: 2,
        }
    }
}

impl Annotator {
    /// Render detections onto a copy of `frame`. The original is untouched.
    pub fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
        options: &AnnotateOptions,
    ) -> Frame {
        let mut out = frame.clone();
        let (width, height) = (frame.width(), frame.height());

        for detection in detections {
            let Some(bbox) = detection.bbox.clip(width, height) else {
                continue;
            };
            let (x1, y1) = (bbox.x1 as u32, bbox.y1 as u32);
            let (x2, y2) = (bbox.x2 as u32, bbox.y2 as u32);
            self.draw_rect(&mut out, x1, y1, x2, y2);

            if options.draw_confidence {
                let label = format!("{:.2}", detection.confidence);
                draw_text(&mut out, &label, x1 + self.stroke + 2, y1 + self.stroke + 2, self.text_color);
            }
        }

        if options.draw_timestamp {
            let clock = Local::now().format("%H:%M:%S").to_string();
            let (x, y) = TIMESTAMP_ORIGIN;
            fill_rect(
                &mut out,
                x.saturating_sub(2),
                y.saturating_sub(2),
                x + clock.len() as u32 * GLYPH_WIDTH + 2,
                y + GLYPH_HEIGHT + 2,
                [0, 0, 0],
            );
            draw_text(&mut out, &clock, x, y, self.text_color);
        }

        out
    }

    fn draw_rect(&self, frame: &mut Frame, x1: u32, y1: u32, x2: u32, y2: u32) {
        for t in 0..self.stroke {
            for x in x1..=x2 {
                frame.put_pixel(x, y1 + t, self.box_color);
                frame.put_pixel(x, y2.saturating_sub(t), self.box_color);
            }
            for y in y1..=y2 {
                frame.put_pixel(x1 + t, y, self.box_color);
                frame.put_pixel(x2.saturating_sub(t), y, self.box_color);
            }
        }
    }
}

fn fill_rect(frame: &mut Frame, x1: u32, y1: u32, x2: u32, y2: u32, color: [u8; 3]) {
    for y in y1..=y2 {
        for x in x1..=x2 {
            frame.put_pixel(x, y, color);
        }
    }
}

fn draw_text(frame: &mut Frame, text: &str, origin_x: u32, origin_y: u32, color: [u8; 3]) {
    let mut x = origin_x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (dy, row) in rows.iter().enumerate() {
                for dx in 0..5u32 {
                    if (row >> (4 - dx)) & 1 == 1 {
                        frame.put_pixel(x + dx, origin_y + dy as u32, color);
                    }
                }
            }
        }
        x += GLYPH_WIDTH;
    }
}

/// 5x7 glyphs, one bit per pixel, MSB left. Unknown characters render as a
/// blank advance.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x04, 0x04, 0x00, 0x04, 0x04, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        _ => return None,
    };
    Some(rows)
}
