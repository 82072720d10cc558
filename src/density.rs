//! Density queries along curves.
//!
//! A curve ([`Interface1D`]) is walked as a lazy sequence of sample points
//! ([`SampledPoints`]). 1D functions read a density source at the midpoint of
//! every pair of consecutive samples and reduce the readings to one scalar
//! with an [`IntegrationType`].

use log::warn;

use crate::canvas::CanvasContext;
use crate::context_functions;
use crate::error::{Error, Result};
use crate::steerable::EdgeId;
use crate::stroke::Stroke;
use crate::types::Vec2;

/// Sampling step used when a function is built with [`Default`].
pub const DEFAULT_SAMPLING: f32 = 2.0;

/// Upper bound on the sample steps taken along one segment.
pub const MAX_SEGMENT_STEPS: usize = 1 << 16;

/// A point of a curve: projected position, depth, and the edge the curve
/// follows from here to the next point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point0D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub edge: Option<EdgeId>,
}

impl Point0D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, ..Self::default() }
    }

    pub fn with_edge(mut self, edge: EdgeId) -> Self {
        self.edge = Some(edge);
        self
    }

    pub fn point2d(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Interpolated point; keeps the edge of `self`.
    pub fn lerp(&self, other: &Point0D, t: f32) -> Point0D {
        let p = self.point2d().lerp(other.point2d(), t);
        Point0D { x: p.x, y: p.y, z: self.z + (other.z - self.z) * t, edge: self.edge }
    }

    fn midpoint(&self, other: &Point0D) -> Point0D {
        self.lerp(other, 0.5)
    }
}

/// A 1D element of the drawing: a stroke, a chain of edges, a polyline.
pub trait Interface1D {
    fn vertices(&self) -> Vec<Point0D>;

    /// Vertices plus evenly spaced points in between, so that no two
    /// consecutive points are further apart than `sampling`. A non-positive
    /// `sampling` yields the vertices only.
    fn points(&self, sampling: f32) -> SampledPoints {
        SampledPoints::new(self.vertices(), sampling)
    }
}

/// Forward-only walk over the sample points of a curve.
#[derive(Clone, Debug)]
pub struct SampledPoints {
    vertices: Vec<Point0D>,
    sampling: f32,
    segment: usize,
    step: usize,
    steps: usize,
}

impl SampledPoints {
    pub fn new(vertices: Vec<Point0D>, sampling: f32) -> Self {
        Self { vertices, sampling, segment: 0, step: 0, steps: 0 }
    }

    fn steps_for(&self, a: &Point0D, b: &Point0D) -> usize {
        if !(self.sampling > 0.0) {
            return 1;
        }
        let length = (b.point2d() - a.point2d()).norm();
        let steps = (length / self.sampling).ceil();
        if steps > MAX_SEGMENT_STEPS as f32 {
            warn!("sampling {} over a segment of length {length}: capped at {MAX_SEGMENT_STEPS} steps", self.sampling);
            return MAX_SEGMENT_STEPS;
        }
        (steps as usize).max(1)
    }
}

impl Iterator for SampledPoints {
    type Item = Point0D;

    fn next(&mut self) -> Option<Point0D> {
        let n = self.vertices.len();
        if self.segment >= n {
            return None;
        }
        if self.segment == n - 1 {
            self.segment += 1;
            return Some(self.vertices[n - 1]);
        }
        let (a, b) = (self.vertices[self.segment], self.vertices[self.segment + 1]);
        if self.step == 0 {
            self.steps = self.steps_for(&a, &b);
        }
        let p = a.lerp(&b, self.step as f32 / self.steps as f32);
        self.step += 1;
        if self.step == self.steps {
            self.segment += 1;
            self.step = 0;
        }
        Some(p)
    }
}

/// Plain chain of points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyline {
    points: Vec<Point0D>,
}

impl Polyline {
    pub fn new(points: Vec<Point0D>) -> Self {
        Self { points }
    }

    pub fn from_xy(points: &[(f32, f32)]) -> Self {
        Self { points: points.iter().map(|&(x, y)| Point0D::new(x, y)).collect() }
    }
}

impl Interface1D for Polyline {
    fn vertices(&self) -> Vec<Point0D> {
        self.points.clone()
    }
}

impl Interface1D for Stroke {
    fn vertices(&self) -> Vec<Point0D> {
        Stroke::vertices(self)
            .iter()
            .map(|v| Point0D { x: v.point.x, y: v.point.y, z: v.z, edge: v.edge })
            .collect()
    }
}

/// How per-sample readings reduce to one value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegrationType {
    Min,
    Max,
    First,
    Last,
    #[default]
    Mean,
}

/// Reduce `values` with `policy`. Nothing to reduce gives 0.
pub fn integrate(values: impl IntoIterator<Item = f32>, policy: IntegrationType) -> f32 {
    let mut it = values.into_iter();
    let Some(first) = it.next() else {
        warn!("integrating over an empty curve, returning 0");
        return 0.0;
    };
    match policy {
        IntegrationType::Min => it.fold(first, f32::min),
        IntegrationType::Max => it.fold(first, f32::max),
        IntegrationType::First => first,
        IntegrationType::Last => it.last().unwrap_or(first),
        IntegrationType::Mean => {
            let (sum, count) = it.fold((first, 1usize), |(s, n), v| (s + v, n + 1));
            sum / count as f32
        }
    }
}

/// Scalar function of a point.
pub trait UnaryFunction0D {
    fn evaluate(&self, cx: &CanvasContext, p: &Point0D) -> Result<f32>;
}

impl<F> UnaryFunction0D for F
where
    F: Fn(&CanvasContext, &Point0D) -> Result<f32>,
{
    fn evaluate(&self, cx: &CanvasContext, p: &Point0D) -> Result<f32> {
        self(cx, p)
    }
}

/// Scalar function of a curve.
pub trait UnaryFunction1D {
    fn evaluate(&self, cx: &CanvasContext, curve: &dyn Interface1D) -> Result<f32>;
}

// Map coordinates are whole pixels: a point reads the pixel it falls in.
fn pixel_coords(p: &Point0D) -> (i32, i32) {
    (p.x.floor() as i32, p.y.floor() as i32)
}

/// Reading of a named map loaded on the canvas.
#[derive(Clone, Debug)]
pub struct ReadMapPixelF0D {
    pub map_name: String,
    pub level: usize,
}

impl ReadMapPixelF0D {
    pub fn new(map_name: impl Into<String>, level: usize) -> Self {
        Self { map_name: map_name.into(), level }
    }
}

impl UnaryFunction0D for ReadMapPixelF0D {
    fn evaluate(&self, cx: &CanvasContext, p: &Point0D) -> Result<f32> {
        let (x, y) = pixel_coords(p);
        context_functions::read_map_pixel(cx, &self.map_name, self.level, x, y)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ReadSteerableViewMapPixelF0D {
    pub orientation: usize,
    pub level: usize,
}

impl UnaryFunction0D for ReadSteerableViewMapPixelF0D {
    fn evaluate(&self, cx: &CanvasContext, p: &Point0D) -> Result<f32> {
        let (x, y) = pixel_coords(p);
        context_functions::read_directional_view_map_pixel(cx, self.orientation, self.level, x, y)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ReadCompleteViewMapPixelF0D {
    pub level: usize,
}

impl UnaryFunction0D for ReadCompleteViewMapPixelF0D {
    fn evaluate(&self, cx: &CanvasContext, p: &Point0D) -> Result<f32> {
        let (x, y) = pixel_coords(p);
        context_functions::read_complete_view_map_pixel(cx, self.level, x, y)
    }
}

/// Norm of the forward-difference gradient of the complete view map. The
/// difference step is one pixel of the level read.
#[derive(Clone, Copy, Debug)]
pub struct ViewMapGradientNormF0D {
    level: usize,
    step: i32,
}

impl ViewMapGradientNormF0D {
    pub fn new(level: usize) -> Self {
        Self { level, step: 1 << level.min(30) }
    }
}

impl UnaryFunction0D for ViewMapGradientNormF0D {
    fn evaluate(&self, cx: &CanvasContext, p: &Point0D) -> Result<f32> {
        let (x, y) = pixel_coords(p);
        let read = |x, y| context_functions::read_complete_view_map_pixel(cx, self.level, x, y);
        let here = read(x, y)?;
        let gx = read(x + self.step, y)? - here;
        let gy = read(x, y + self.step)? - here;
        Ok(Vec2::new(gx, gy).norm())
    }
}

/// Walk `curve` and call `f(a, b, midpoint)` for every pair of consecutive samples.
fn over_segments(
    curve: &dyn Interface1D,
    sampling: f32,
    mut f: impl FnMut(&Point0D, &Point0D, &Point0D) -> Result<f32>,
) -> Result<Vec<f32>> {
    let mut points = curve.points(sampling);
    let mut values = Vec::new();
    let Some(mut prev) = points.next() else {
        return Ok(values);
    };
    for p in points {
        values.push(f(&prev, &p, &prev.midpoint(&p))?);
        prev = p;
    }
    Ok(values)
}

/// Any 0D function integrated along a curve.
#[derive(Clone, Debug)]
pub struct DensityF1D<F> {
    pub fun: F,
    pub integration: IntegrationType,
    pub sampling: f32,
}

impl<F: UnaryFunction0D> DensityF1D<F> {
    pub fn new(fun: F, integration: IntegrationType, sampling: f32) -> Self {
        Self { fun, integration, sampling }
    }
}

impl<F: UnaryFunction0D> UnaryFunction1D for DensityF1D<F> {
    fn evaluate(&self, cx: &CanvasContext, curve: &dyn Interface1D) -> Result<f32> {
        let values = over_segments(curve, self.sampling, |_, _, m| self.fun.evaluate(cx, m))?;
        Ok(integrate(values, self.integration))
    }
}

/// Shared parameters of the view-map densities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewMapQuery {
    pub level: usize,
    pub integration: IntegrationType,
    pub sampling: f32,
}

impl Default for ViewMapQuery {
    fn default() -> Self {
        Self { level: 0, integration: IntegrationType::Mean, sampling: DEFAULT_SAMPLING }
    }
}

/// Density of all edges around the curve.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompleteViewMapDensityF1D(pub ViewMapQuery);

impl UnaryFunction1D for CompleteViewMapDensityF1D {
    fn evaluate(&self, cx: &CanvasContext, curve: &dyn Interface1D) -> Result<f32> {
        let q = self.0;
        let f = ReadCompleteViewMapPixelF0D { level: q.level };
        let values = over_segments(curve, q.sampling, |_, _, m| f.evaluate(cx, m))?;
        Ok(integrate(values, q.integration))
    }
}

/// Density of the edges of one fixed orientation around the curve.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalViewMapDensityF1D {
    pub orientation: usize,
    pub query: ViewMapQuery,
}

impl UnaryFunction1D for DirectionalViewMapDensityF1D {
    fn evaluate(&self, cx: &CanvasContext, curve: &dyn Interface1D) -> Result<f32> {
        let q = self.query;
        let f = ReadSteerableViewMapPixelF0D { orientation: self.orientation, level: q.level };
        let values = over_segments(curve, q.sampling, |_, _, m| f.evaluate(cx, m))?;
        Ok(integrate(values, q.integration))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ViewMapGradientNormF1D(pub ViewMapQuery);

impl UnaryFunction1D for ViewMapGradientNormF1D {
    fn evaluate(&self, cx: &CanvasContext, curve: &dyn Interface1D) -> Result<f32> {
        let q = self.0;
        let f = ViewMapGradientNormF0D::new(q.level);
        let values = over_segments(curve, q.sampling, |_, _, m| f.evaluate(cx, m))?;
        Ok(integrate(values, q.integration))
    }
}

/// Density of the edges running along the curve itself: each segment reads
/// the oriented map of its underlying edge, or of its own direction when the
/// edge is unknown to the steerable view map.
#[derive(Clone, Copy, Debug, Default)]
pub struct SteerableViewMapDensityF1D(pub ViewMapQuery);

impl UnaryFunction1D for SteerableViewMapDensityF1D {
    fn evaluate(&self, cx: &CanvasContext, curve: &dyn Interface1D) -> Result<f32> {
        let q = self.0;
        let svm = cx.steerable_view_map().ok_or(Error::NoSteerableViewMap)?;
        let values = over_segments(curve, q.sampling, |a, b, m| {
            let orientation = a
                .edge
                .and_then(|e| svm.svm_number(e))
                .unwrap_or_else(|| svm.svm_number_for_direction(b.point2d() - a.point2d()));
            let (x, y) = pixel_coords(m);
            svm.read_steerable_view_map_pixel(orientation, q.level, x, y)
        })?;
        Ok(integrate(values, q.integration))
    }
}
