/// One raw output row from the detector network.
///
/// Boxes are center-format and normalized to 0..1 of the source image,
/// which is how the detector emits them. `confidence` is the combined
/// objectness and class score for `class_id`.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawDetection {
    /// Denormalize into an absolute top-left pixel box.
    pub fn to_pixel_box(&self, image_width: u32, image_height: u32) -> Detection {
        let width = self.w * image_width as f32;
        let height = self.h * image_height as f32;
        Detection {
            x: self.cx * image_width as f32 - width / 2.0,
            y: self.cy * image_height as f32 - height / 2.0,
            width,
            height,
            confidence: self.confidence,
        }
    }
}

/// Pixel-space detection, top-left corner plus size. May extend past the
/// image bounds until clamped.
#[derive(Clone, Debug)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl Detection {
    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.width * self.height + other.width * other.height - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp to the image bounds. Returns `None` when nothing of the box
    /// remains inside the image.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<PersonBox> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = (self.x + self.width).min(image_width as f32);
        let y1 = (self.y + self.height).min(image_height as f32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let x = x0 as u32;
        let y = y0 as u32;
        let width = (x1 as u32).saturating_sub(x);
        let height = (y1 as u32).saturating_sub(y);
        if width == 0 || height == 0 {
            return None;
        }

        Some(PersonBox {
            x,
            y,
            width,
            height,
            confidence: self.confidence,
        })
    }
}

/// A person box that survived suppression and clamping.
///
/// Invariant: `x + width <= image_width` and `y + height <= image_height`
/// for the image it was clamped against, and both sides are non-zero.
#[derive(Clone, Debug)]
pub struct PersonBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detection confidence carried through from the raw row.
    pub confidence: f32,
}

impl PersonBox {
    /// `[x, y, width, height]` as reported in the response envelope.
    pub fn to_array(&self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}
