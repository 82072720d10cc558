// Strokes produced by one style module, rendered in insertion order.

use std::collections::VecDeque;

use crate::error::Result;
use crate::render::StrokeRenderer;
use crate::stroke::Stroke;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrokeLayer {
    strokes: VecDeque<Stroke>,
}

impl StrokeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stroke(&mut self, stroke: Stroke) {
        self.strokes.push_back(stroke);
    }

    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    pub fn strokes_mut(&mut self) -> impl Iterator<Item = &mut Stroke> {
        self.strokes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn scale_thickness(&mut self, factor: f32) {
        for s in &mut self.strokes {
            s.scale_thickness(factor);
        }
    }

    pub fn render(&self, renderer: &mut dyn StrokeRenderer) -> Result<()> {
        for s in &self.strokes {
            s.render(renderer)?;
        }
        Ok(())
    }

    pub fn render_basic(&self, renderer: &mut dyn StrokeRenderer) -> Result<()> {
        for s in &self.strokes {
            s.render_basic(renderer)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }
}

impl FromIterator<Stroke> for StrokeLayer {
    fn from_iter<I: IntoIterator<Item = Stroke>>(iter: I) -> Self {
        Self { strokes: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TextStrokeRenderer;
    use crate::stroke::{StrokeAttribute, StrokeVertex};
    use crate::types::Vec2;
    use test_log::test;

    fn layer() -> StrokeLayer {
        (0..3)
            .map(|i| {
                let y = i as f32 * 5.0;
                Stroke::new(vec![
                    StrokeVertex::new(Vec2::new(0.0, y), StrokeAttribute::default()),
                    StrokeVertex::new(Vec2::new(10.0, y), StrokeAttribute::default()),
                ])
                .with_id(i)
            })
            .collect()
    }

    fn dump(layer: &StrokeLayer) -> String {
        let mut r = TextStrokeRenderer::new(Vec::new(), 10, 10).unwrap();
        layer.render(&mut r).unwrap();
        String::from_utf8(r.finish().unwrap()).unwrap()
    }

    #[test]
    fn keeps_insertion_order() {
        let l = layer();
        let ids: Vec<u32> = l.strokes().map(Stroke::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(l.len(), 3);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut l = layer();
        l.clear();
        assert!(l.is_empty());
        l.clear();
        assert!(l.is_empty());
        assert_eq!(dump(&l).lines().count(), 4);
    }

    #[test]
    fn scaling_then_rendering_matches_rendering_scaled_strokes() {
        let mut scaled_layer = layer();
        scaled_layer.scale_thickness(2.5);

        let mut by_hand = StrokeLayer::new();
        for mut s in layer().strokes().cloned() {
            s.scale_thickness(2.5);
            by_hand.add_stroke(s);
        }
        assert_eq!(dump(&scaled_layer), dump(&by_hand));
        assert!(dump(&scaled_layer).contains(" 2.5 2.5 "));
    }
}
