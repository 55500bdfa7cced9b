/// Axis-aligned pixel bounding box in TLBR format (x1, y1, x2, y2).
///
/// Coordinates follow image conventions: `x` grows to the right, `y` grows
/// downwards, and the bottom-right corner is exclusive when cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    #[inline]
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a pixel box from floating point TLBR coordinates.
    ///
    /// Coordinates are truncated towards zero, the way detector outputs are
    /// usually cast to integer pixels.
    #[inline]
    pub fn from_tlbr_f32(tlbr: [f32; 4]) -> Self {
        Self {
            x1: tlbr[0] as i32,
            y1: tlbr[1] as i32,
            x2: tlbr[2] as i32,
            y2: tlbr[3] as i32,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Integer centre point, rounded towards negative infinity.
    #[inline]
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x1 + self.x2).div_euclid(2),
            (self.y1 + self.y2).div_euclid(2),
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Clamp the box to an image of the given size.
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        Self {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        }
    }

    /// Shift the box by an offset, e.g. to map a crop-relative box back to
    /// frame coordinates.
    #[inline]
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    #[inline]
    pub fn to_tlbr(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_floors() {
        let bbox = BBox::new(10, 20, 31, 41);
        assert_eq!(bbox.center(), (20, 30));

        let negative = BBox::new(-5, -5, 0, 0);
        assert_eq!(negative.center(), (-3, -3));
    }

    #[test]
    fn test_from_tlbr_truncates() {
        let bbox = BBox::from_tlbr_f32([10.9, 20.2, 50.7, 80.99]);
        assert_eq!(bbox.to_tlbr(), [10, 20, 50, 80]);
    }

    #[test]
    fn test_clamp_to_image() {
        let bbox = BBox::new(-10, 5, 700, 500);
        let clamped = bbox.clamp_to(640, 480);
        assert_eq!(clamped, BBox::new(0, 5, 640, 480));
        assert!(!clamped.is_empty());

        let outside = BBox::new(700, 500, 800, 600).clamp_to(640, 480);
        assert!(outside.is_empty());
    }
}
