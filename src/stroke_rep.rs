// Renderer-facing geometry of a stroke.
// Each run of visible vertices becomes one triangle strip with two strip
// vertices per stroke vertex: left edge first, then right edge.

use log::trace;

use crate::render::texture::TextureId;
use crate::stroke::{MediumType, Stroke, StrokeVertex};
use crate::types::Vec2;

/// Interior joins never push the outline further than this many half-widths.
const MITER_LIMIT: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeVertexRep {
    pub point2d: Vec2,
    pub color: [f32; 3],
    pub alpha: f32,
    pub tex_coord: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Strip {
    vertices: Vec<StrokeVertexRep>,
    average_thickness: f32,
}

impl Strip {
    /// `run` must hold at least two stroke vertices.
    fn new(run: &[&StrokeVertex]) -> Self {
        debug_assert!(run.len() >= 2);
        let normals = strip_normals(run);

        let mut total = 0.0;
        for v in run {
            total += v.attribute.thickness_r() + v.attribute.thickness_l();
        }
        let mut average_thickness = total / run.len() as f32;
        if average_thickness <= f32::EPSILON {
            average_thickness = 1.0;
        }

        let mut vertices = Vec::with_capacity(2 * run.len());
        for (v, (n, miter)) in run.iter().zip(normals) {
            let a = &v.attribute;
            let s = v.curvilinear_abscissa() / average_thickness;
            let left = v.point + n * (a.thickness_l() * miter);
            let right = v.point - n * (a.thickness_r() * miter);
            vertices.push(StrokeVertexRep {
                point2d: left,
                color: a.color,
                alpha: a.alpha,
                tex_coord: Vec2::new(s, 0.0),
            });
            vertices.push(StrokeVertexRep {
                point2d: right,
                color: a.color,
                alpha: a.alpha,
                tex_coord: Vec2::new(s, 1.0),
            });
        }
        Self { vertices, average_thickness }
    }

    /// Strip from prepared vertices; fewer than three cannot form a triangle.
    pub fn from_vertices(vertices: Vec<StrokeVertexRep>, average_thickness: f32) -> Option<Self> {
        (vertices.len() >= 3).then_some(Self { vertices, average_thickness })
    }

    pub fn vertices(&self) -> &[StrokeVertexRep] {
        &self.vertices
    }

    pub fn average_thickness(&self) -> f32 {
        self.average_thickness
    }

    /// Consecutive vertex triples, in strip order.
    pub fn triangles(&self) -> impl Iterator<Item = [&StrokeVertexRep; 3]> {
        self.vertices.windows(3).map(|w| [&w[0], &w[1], &w[2]])
    }
}

/// Left normal and miter scale at each vertex of a run.
fn strip_normals(run: &[&StrokeVertex]) -> Vec<(Vec2, f32)> {
    let n = run.len();
    let seg_normal = |i: usize| (run[i + 1].point - run[i].point).normalized().perp();

    let mut out = Vec::with_capacity(n);
    let mut last_valid = Vec2::new(0.0, 1.0);
    for i in 0..n {
        let before = if i > 0 { Some(seg_normal(i - 1)) } else { None };
        let after = if i + 1 < n { Some(seg_normal(i)) } else { None };
        let (normal, miter) = match (before, after) {
            (Some(a), Some(b)) if a != Vec2::ZERO && b != Vec2::ZERO => {
                let bisector = (a + b).normalized();
                if bisector == Vec2::ZERO {
                    // Full turn back: no meaningful join, keep the incoming side.
                    (a, 1.0)
                } else {
                    let cos = bisector.dot(a).max(1.0 / MITER_LIMIT);
                    (bisector, 1.0 / cos)
                }
            }
            (Some(a), _) if a != Vec2::ZERO => (a, 1.0),
            (_, Some(b)) if b != Vec2::ZERO => (b, 1.0),
            _ => {
                trace!("coincident stroke vertices at {i}, reusing previous normal");
                (last_valid, 1.0)
            }
        };
        last_valid = normal;
        out.push((normal, miter));
    }
    out
}

/// Strip geometry of one stroke, alive for one render call.
#[derive(Debug)]
pub struct StrokeRep<'a> {
    stroke: &'a Stroke,
    strips: Vec<Strip>,
    medium: MediumType,
    texture: TextureId,
}

impl<'a> StrokeRep<'a> {
    pub fn new(stroke: &'a Stroke) -> Self {
        let mut strips = Vec::new();
        let mut run: Vec<&StrokeVertex> = Vec::new();
        for v in stroke.vertices() {
            if v.attribute.visible {
                run.push(v);
                continue;
            }
            if run.len() > 1 {
                strips.push(Strip::new(&run));
            }
            run.clear();
        }
        if run.len() > 1 {
            strips.push(Strip::new(&run));
        }
        Self { stroke, strips, medium: stroke.medium_type(), texture: stroke.texture_id() }
    }

    /// Rep with caller-built geometry instead of the stroke's own outline.
    pub fn from_strips(stroke: &'a Stroke, strips: Vec<Strip>) -> Self {
        Self { stroke, strips, medium: stroke.medium_type(), texture: stroke.texture_id() }
    }

    pub fn stroke(&self) -> &'a Stroke {
        self.stroke
    }

    pub fn strips(&self) -> &[Strip] {
        &self.strips
    }

    pub fn medium_type(&self) -> MediumType {
        self.medium
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture
    }

    /// Renderers resolve the default brush for the medium through this.
    pub fn set_texture_id(&mut self, id: TextureId) {
        self.texture = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::StrokeAttribute;
    use test_log::test;

    fn attr(thickness: f32) -> StrokeAttribute {
        StrokeAttribute { color: [0.2, 0.4, 0.6], alpha: 0.8, thickness: [thickness, thickness], visible: true }
    }

    fn stroke(points: &[(f32, f32)]) -> Stroke {
        Stroke::new(points.iter().map(|&(x, y)| StrokeVertex::new(Vec2::new(x, y), attr(1.0))).collect())
    }

    #[test]
    fn strip_covers_every_vertex_in_order() {
        let pts = [(0.0, 0.0), (10.0, 0.0), (20.0, 5.0), (30.0, 5.0), (35.0, 20.0)];
        let s = stroke(&pts);
        let rep = StrokeRep::new(&s);
        assert_eq!(rep.strips().len(), 1);
        let verts = rep.strips()[0].vertices();
        assert!(verts.len() >= pts.len());
        assert_eq!(verts.len(), 2 * pts.len());
        for (pair, &(x, y)) in verts.chunks(2).zip(&pts) {
            let mid = pair[0].point2d.midpoint(pair[1].point2d);
            assert!((mid.x - x).abs() < 1e-4 && (mid.y - y).abs() < 1e-4);
            assert_eq!(pair[0].tex_coord.y, 0.0);
            assert_eq!(pair[1].tex_coord.y, 1.0);
        }
    }

    #[test]
    fn straight_stroke_offsets_by_thickness() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let rep = StrokeRep::new(&s);
        let v = rep.strips()[0].vertices();
        assert_eq!(v[0].point2d, Vec2::new(0.0, 1.0));
        assert_eq!(v[1].point2d, Vec2::new(0.0, -1.0));
        assert_eq!(v[2].point2d, Vec2::new(10.0, 1.0));
        assert_eq!(v[3].point2d, Vec2::new(10.0, -1.0));
        assert_eq!(v[2].color, [0.2, 0.4, 0.6]);
        assert_eq!(v[2].alpha, 0.8);
        assert_eq!(rep.strips()[0].average_thickness(), 2.0);
        assert_eq!(v[4].tex_coord.x, 10.0);
    }

    #[test]
    fn sharp_corner_is_miter_limited() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0), (0.0, 0.5)]);
        let rep = StrokeRep::new(&s);
        let v = rep.strips()[0].vertices();
        let corner = Vec2::new(10.0, 0.0);
        assert!((v[2].point2d - corner).norm() <= MITER_LIMIT + 1e-4);
    }

    #[test]
    fn invisible_vertices_split_strips() {
        let mut s = stroke(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0), (5.0, 0.0)]);
        for (i, a) in s.attributes_mut().enumerate() {
            a.visible = i != 2 && i != 4;
        }
        let rep = StrokeRep::new(&s);
        // [0,1] forms a strip, [3] alone does not, [5] alone does not.
        assert_eq!(rep.strips().len(), 1);
        assert_eq!(rep.strips()[0].vertices().len(), 4);
    }

    #[test]
    fn every_strip_is_a_valid_triangle_strip() {
        let s = stroke(&[(0.0, 0.0), (3.0, 4.0)]);
        let rep = StrokeRep::new(&s);
        for strip in rep.strips() {
            assert!(strip.vertices().len() >= 3);
            assert_eq!(strip.triangles().count(), strip.vertices().len() - 2);
        }
    }

    #[test]
    fn coincident_points_do_not_produce_nan() {
        let s = stroke(&[(1.0, 1.0), (1.0, 1.0), (5.0, 1.0)]);
        let rep = StrokeRep::new(&s);
        for v in rep.strips()[0].vertices() {
            assert!(v.point2d.x.is_finite() && v.point2d.y.is_finite());
        }
    }
}
