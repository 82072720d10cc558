// Logical strokes as produced by style modules.
// A stroke is an ordered list of vertices, each carrying the attributes the
// style module annotated (color, alpha, thickness, visibility).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::render::texture::TextureId;
use crate::render::StrokeRenderer;
use crate::steerable::EdgeId;
use crate::stroke_rep::StrokeRep;
use crate::types::Vec2;

/// How a stroke's color is composited onto the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediumType {
    /// Pigment piles up; the darkest deposit wins.
    DryMedium,
    /// Wet glaze; successive strokes darken additively.
    HumidMedium,
    /// Covers what is underneath according to alpha.
    OpaqueMedium,
    /// Blended, textured default.
    #[default]
    Textured,
}

/// Per-vertex attributes set by style modules.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeAttribute {
    pub color: [f32; 3],
    pub alpha: f32,
    /// [right, left] half-widths in pixels.
    pub thickness: [f32; 2],
    pub visible: bool,
}

impl Default for StrokeAttribute {
    fn default() -> Self {
        Self { color: [0.0; 3], alpha: 1.0, thickness: [1.0, 1.0], visible: true }
    }
}

impl StrokeAttribute {
    pub fn thickness_r(&self) -> f32 {
        self.thickness[0]
    }

    pub fn thickness_l(&self) -> f32 {
        self.thickness[1]
    }

    pub fn set_thickness(&mut self, right: f32, left: f32) {
        self.thickness = [right, left];
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StrokeVertex {
    /// Projected position in canvas pixels.
    pub point: Vec2,
    /// Depth of the underlying 3D point.
    pub z: f32,
    /// Edge of the view map the segment leaving this vertex lies on.
    pub edge: Option<EdgeId>,
    pub attribute: StrokeAttribute,
    abscissa: f32,
    u: f32,
}

impl StrokeVertex {
    pub fn new(point: Vec2, attribute: StrokeAttribute) -> Self {
        Self { point, z: 0.0, edge: None, attribute, abscissa: 0.0, u: 0.0 }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    pub fn with_edge(mut self, edge: EdgeId) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Arc length from the first vertex.
    pub fn curvilinear_abscissa(&self) -> f32 {
        self.abscissa
    }

    /// Arc length normalised to [0,1].
    pub fn u(&self) -> f32 {
        self.u
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    id: u32,
    vertices: Vec<StrokeVertex>,
    medium: MediumType,
    texture: TextureId,
    length: f32,
}

impl Stroke {
    pub fn new(vertices: Vec<StrokeVertex>) -> Self {
        let mut s = Self {
            id: 0,
            vertices,
            medium: MediumType::default(),
            texture: TextureId::NONE,
            length: 0.0,
        };
        s.update_length();
        s
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn with_medium(mut self, medium: MediumType) -> Self {
        self.medium = medium;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn medium_type(&self) -> MediumType {
        self.medium
    }

    pub fn set_medium_type(&mut self, medium: MediumType) {
        self.medium = medium;
    }

    /// `TextureId::NONE` means "default brush for the medium".
    pub fn texture_id(&self) -> TextureId {
        self.texture
    }

    pub fn set_texture_id(&mut self, id: TextureId) {
        self.texture = id;
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn vertices(&self) -> &[StrokeVertex] {
        &self.vertices
    }

    /// Attribute edits do not move vertices, so abscissae stay valid.
    pub fn attributes_mut(&mut self) -> impl Iterator<Item = &mut StrokeAttribute> {
        self.vertices.iter_mut().map(|v| &mut v.attribute)
    }

    pub fn push_vertex(&mut self, v: StrokeVertex) {
        self.vertices.push(v);
        self.update_length();
    }

    /// Recompute curvilinear abscissae and the normalised parameter.
    pub fn update_length(&mut self) {
        let mut acc = 0.0;
        let mut prev: Option<Vec2> = None;
        for v in &mut self.vertices {
            if let Some(p) = prev {
                acc += (v.point - p).norm();
            }
            v.abscissa = acc;
            prev = Some(v.point);
        }
        self.length = acc;
        for v in &mut self.vertices {
            v.u = if acc > 0.0 { v.abscissa / acc } else { 0.0 };
        }
    }

    /// Multiply both half-widths of every vertex.
    pub fn scale_thickness(&mut self, factor: f32) {
        for a in self.attributes_mut() {
            let (r, l) = (a.thickness_r(), a.thickness_l());
            a.set_thickness(factor * r, factor * l);
        }
    }

    pub fn render(&self, renderer: &mut dyn StrokeRenderer) -> Result<()> {
        let rep = StrokeRep::new(self);
        renderer.render_stroke_rep(&rep)
    }

    pub fn render_basic(&self, renderer: &mut dyn StrokeRenderer) -> Result<()> {
        let rep = StrokeRep::new(self);
        renderer.render_stroke_rep_basic(&rep)
    }
}
