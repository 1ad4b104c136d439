//! SSD anchors.
//!
//! Palm detection predicts boxes as offsets from a grid of fixed anchor points. Only anchors of
//! unit size are generated, since the palm networks predict box sizes in absolute pixels.

use std::ops::Index;

/// Center of an anchor, relative to the network input (`0.0..1.0` on both axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Feature map of one SSD output layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    boxes_per_cell: u32,
    width: u32,
    height: u32,
}

impl LayerInfo {
    /// A `width` by `height` feature map predicting `boxes_per_cell` boxes in every cell.
    ///
    /// # Panics
    ///
    /// Panics if `boxes_per_cell` is zero.
    pub fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell > 0, "SSD layer must predict boxes");
        Self {
            boxes_per_cell,
            width,
            height,
        }
    }

    /// Anchors of this layer, row by row.
    fn anchors(self) -> impl Iterator<Item = Anchor> {
        let (w, h) = (self.width as f32, self.height as f32);
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .flat_map(move |(x, y)| {
                let anchor = Anchor {
                    x_center: (x as f32 + 0.5) / w,
                    y_center: (y as f32 + 0.5) / h,
                };
                std::iter::repeat(anchor).take(self.boxes_per_cell as usize)
            })
    }
}

/// Every anchor of a network, in the order of its outputs.
#[derive(Debug)]
pub struct Anchors(Vec<Anchor>);

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        Self(layers.iter().flat_map(|layer| layer.anchors()).collect())
    }

    pub fn anchor_count(&self) -> usize {
        self.0.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.0[index]
    }
}
