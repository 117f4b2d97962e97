//! Typed requests: positional arguments decoded from raw value slots, plus
//! the structural counts each primitive implies for its parameter list.

use serde::Serialize;

use crate::error::RibError;
use crate::handles::{HandleKey, HandleKind, HandleTables};
use crate::params::BindScope;
use crate::raw::{RawParameter, RawValues};
use crate::request::Request;
use crate::types::{Handle, ParamCounts};

pub type Matrix = [f32; 16];
pub type BoundBox = [f32; 6];

/// Spline basis: a standard name or an explicit matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Basis {
    Named(String),
    Matrix(Matrix),
}

impl Basis {
    pub fn is_known_name(name: &str) -> bool {
        matches!(
            name,
            "bezier" | "b-spline" | "catmull-rom" | "hermite" | "power"
        )
    }
}

/// One request with its positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request")]
pub enum Call {
    Begin,
    End,
    #[serde(rename = "version")]
    Version { version: f32 },
    Declare { name: String, declaration: String },
    FrameBegin { frame: i32 },
    FrameEnd,
    WorldBegin,
    WorldEnd,
    AttributeBegin,
    AttributeEnd,
    TransformBegin,
    TransformEnd,
    SolidBegin { operation: String },
    SolidEnd,
    ObjectBegin { handle: Handle },
    ObjectEnd,
    ObjectInstance { handle: Handle },
    MotionBegin { times: Vec<f32> },
    MotionEnd,
    ArchiveBegin { name: String, handle: Handle },
    ArchiveEnd,
    ResourceBegin,
    ResourceEnd,
    Resource { name: String, kind: String },
    IfBegin { condition: String },
    ElseIf { condition: String },
    Else,
    IfEnd,

    Format { xres: i32, yres: i32, aspect: f32 },
    FrameAspectRatio { aspect: f32 },
    ScreenWindow { left: f32, right: f32, bottom: f32, top: f32 },
    CropWindow { xmin: f32, xmax: f32, ymin: f32, ymax: f32 },
    Projection { name: String },
    Clipping { near: f32, far: f32 },
    ClippingPlane { point: [f32; 3], normal: [f32; 3] },
    DepthOfField { fstop: f32, focal_length: f32, focal_distance: f32 },
    Shutter { open: f32, close: f32 },
    PixelVariance { variance: f32 },
    PixelSamples { xsamples: f32, ysamples: f32 },
    PixelFilter { filter: String, xwidth: f32, ywidth: f32 },
    Exposure { gain: f32, gamma: f32 },
    Imager { name: String },
    Quantize { kind: String, one: i32, min: i32, max: i32, dither: f32 },
    Display { name: String, kind: String, mode: String },
    Hider { kind: String },
    ColorSamples { n_rgb: Vec<f32>, rgb_n: Vec<f32> },
    RelativeDetail { detail: f32 },
    Option { name: String },

    Attribute { name: String },
    Color { color: Vec<f32> },
    Opacity { opacity: Vec<f32> },
    TextureCoordinates { st: [f32; 8] },
    LightSource { shader: String, handle: Handle },
    AreaLightSource { shader: String, handle: Handle },
    Illuminate { light: Handle, on: bool },
    Surface { shader: String },
    Displacement { shader: String },
    Atmosphere { shader: String },
    Interior { shader: String },
    Exterior { shader: String },
    ShadingRate { size: f32 },
    ShadingInterpolation { kind: String },
    Matte { on: bool },
    Bound { bound: BoundBox },
    Detail { bound: BoundBox },
    DetailRange { offlow: f32, onlow: f32, onhigh: f32, offhigh: f32 },
    GeometricApproximation { kind: String, value: f32 },
    Orientation { orientation: String },
    ReverseOrientation,
    Sides { sides: i32 },
    Basis { ubasis: Basis, ustep: i32, vbasis: Basis, vstep: i32 },

    Identity,
    Transform { matrix: Matrix },
    ConcatTransform { matrix: Matrix },
    Perspective { fov: f32 },
    Translate { dx: f32, dy: f32, dz: f32 },
    Rotate { angle: f32, dx: f32, dy: f32, dz: f32 },
    Scale { sx: f32, sy: f32, sz: f32 },
    Skew { angle: f32, from: [f32; 3], to: [f32; 3] },
    CoordinateSystem { space: String },
    CoordSysTransform { space: String },
    ScopedCoordinateSystem { space: String },

    Polygon { nvertices: usize },
    GeneralPolygon { nverts: Vec<i32> },
    PointsPolygons { nverts: Vec<i32>, verts: Vec<i32> },
    PointsGeneralPolygons { nloops: Vec<i32>, nverts: Vec<i32>, verts: Vec<i32> },
    Patch { kind: String },
    PatchMesh { kind: String, nu: i32, uwrap: String, nv: i32, vwrap: String },
    NuPatch {
        nu: i32,
        uorder: i32,
        uknot: Vec<f32>,
        umin: f32,
        umax: f32,
        nv: i32,
        vorder: i32,
        vknot: Vec<f32>,
        vmin: f32,
        vmax: f32,
    },
    Sphere { radius: f32, zmin: f32, zmax: f32, thetamax: f32 },
    Cone { height: f32, radius: f32, thetamax: f32 },
    Cylinder { radius: f32, zmin: f32, zmax: f32, thetamax: f32 },
    Hyperboloid { point1: [f32; 3], point2: [f32; 3], thetamax: f32 },
    Paraboloid { rmax: f32, zmin: f32, zmax: f32, thetamax: f32 },
    Disk { height: f32, radius: f32, thetamax: f32 },
    Torus { major_radius: f32, minor_radius: f32, phimin: f32, phimax: f32, thetamax: f32 },
    Points { npoints: usize },
    Curves { kind: String, nvertices: Vec<i32>, wrap: String },
    SubdivisionMesh {
        scheme: String,
        nverts: Vec<i32>,
        verts: Vec<i32>,
        tags: Vec<String>,
        nargs: Vec<i32>,
        intargs: Vec<i32>,
        floatargs: Vec<f32>,
    },
    Blobby { nleaf: i32, code: Vec<i32>, floats: Vec<f32>, strings: Vec<String> },
    Geometry { kind: String },

    ReadArchive { name: String, archive: Option<Handle> },
    ArchiveRecord { kind: String, text: String },
    ErrorHandler { name: String },
}

impl Call {
    pub fn request(&self) -> Request {
        match self {
            Call::Begin => Request::Begin,
            Call::End => Request::End,
            Call::Version { .. } => Request::Version,
            Call::Declare { .. } => Request::Declare,
            Call::FrameBegin { .. } => Request::FrameBegin,
            Call::FrameEnd => Request::FrameEnd,
            Call::WorldBegin => Request::WorldBegin,
            Call::WorldEnd => Request::WorldEnd,
            Call::AttributeBegin => Request::AttributeBegin,
            Call::AttributeEnd => Request::AttributeEnd,
            Call::TransformBegin => Request::TransformBegin,
            Call::TransformEnd => Request::TransformEnd,
            Call::SolidBegin { .. } => Request::SolidBegin,
            Call::SolidEnd => Request::SolidEnd,
            Call::ObjectBegin { .. } => Request::ObjectBegin,
            Call::ObjectEnd => Request::ObjectEnd,
            Call::ObjectInstance { .. } => Request::ObjectInstance,
            Call::MotionBegin { .. } => Request::MotionBegin,
            Call::MotionEnd => Request::MotionEnd,
            Call::ArchiveBegin { .. } => Request::ArchiveBegin,
            Call::ArchiveEnd => Request::ArchiveEnd,
            Call::ResourceBegin => Request::ResourceBegin,
            Call::ResourceEnd => Request::ResourceEnd,
            Call::Resource { .. } => Request::Resource,
            Call::IfBegin { .. } => Request::IfBegin,
            Call::ElseIf { .. } => Request::ElseIf,
            Call::Else => Request::Else,
            Call::IfEnd => Request::IfEnd,
            Call::Format { .. } => Request::Format,
            Call::FrameAspectRatio { .. } => Request::FrameAspectRatio,
            Call::ScreenWindow { .. } => Request::ScreenWindow,
            Call::CropWindow { .. } => Request::CropWindow,
            Call::Projection { .. } => Request::Projection,
            Call::Clipping { .. } => Request::Clipping,
            Call::ClippingPlane { .. } => Request::ClippingPlane,
            Call::DepthOfField { .. } => Request::DepthOfField,
            Call::Shutter { .. } => Request::Shutter,
            Call::PixelVariance { .. } => Request::PixelVariance,
            Call::PixelSamples { .. } => Request::PixelSamples,
            Call::PixelFilter { .. } => Request::PixelFilter,
            Call::Exposure { .. } => Request::Exposure,
            Call::Imager { .. } => Request::Imager,
            Call::Quantize { .. } => Request::Quantize,
            Call::Display { .. } => Request::Display,
            Call::Hider { .. } => Request::Hider,
            Call::ColorSamples { .. } => Request::ColorSamples,
            Call::RelativeDetail { .. } => Request::RelativeDetail,
            Call::Option { .. } => Request::Option,
            Call::Attribute { .. } => Request::Attribute,
            Call::Color { .. } => Request::Color,
            Call::Opacity { .. } => Request::Opacity,
            Call::TextureCoordinates { .. } => Request::TextureCoordinates,
            Call::LightSource { .. } => Request::LightSource,
            Call::AreaLightSource { .. } => Request::AreaLightSource,
            Call::Illuminate { .. } => Request::Illuminate,
            Call::Surface { .. } => Request::Surface,
            Call::Displacement { .. } => Request::Displacement,
            Call::Atmosphere { .. } => Request::Atmosphere,
            Call::Interior { .. } => Request::Interior,
            Call::Exterior { .. } => Request::Exterior,
            Call::ShadingRate { .. } => Request::ShadingRate,
            Call::ShadingInterpolation { .. } => Request::ShadingInterpolation,
            Call::Matte { .. } => Request::Matte,
            Call::Bound { .. } => Request::Bound,
            Call::Detail { .. } => Request::Detail,
            Call::DetailRange { .. } => Request::DetailRange,
            Call::GeometricApproximation { .. } => Request::GeometricApproximation,
            Call::Orientation { .. } => Request::Orientation,
            Call::ReverseOrientation => Request::ReverseOrientation,
            Call::Sides { .. } => Request::Sides,
            Call::Basis { .. } => Request::Basis,
            Call::Identity => Request::Identity,
            Call::Transform { .. } => Request::Transform,
            Call::ConcatTransform { .. } => Request::ConcatTransform,
            Call::Perspective { .. } => Request::Perspective,
            Call::Translate { .. } => Request::Translate,
            Call::Rotate { .. } => Request::Rotate,
            Call::Scale { .. } => Request::Scale,
            Call::Skew { .. } => Request::Skew,
            Call::CoordinateSystem { .. } => Request::CoordinateSystem,
            Call::CoordSysTransform { .. } => Request::CoordSysTransform,
            Call::ScopedCoordinateSystem { .. } => Request::ScopedCoordinateSystem,
            Call::Polygon { .. } => Request::Polygon,
            Call::GeneralPolygon { .. } => Request::GeneralPolygon,
            Call::PointsPolygons { .. } => Request::PointsPolygons,
            Call::PointsGeneralPolygons { .. } => Request::PointsGeneralPolygons,
            Call::Patch { .. } => Request::Patch,
            Call::PatchMesh { .. } => Request::PatchMesh,
            Call::NuPatch { .. } => Request::NuPatch,
            Call::Sphere { .. } => Request::Sphere,
            Call::Cone { .. } => Request::Cone,
            Call::Cylinder { .. } => Request::Cylinder,
            Call::Hyperboloid { .. } => Request::Hyperboloid,
            Call::Paraboloid { .. } => Request::Paraboloid,
            Call::Disk { .. } => Request::Disk,
            Call::Torus { .. } => Request::Torus,
            Call::Points { .. } => Request::Points,
            Call::Curves { .. } => Request::Curves,
            Call::SubdivisionMesh { .. } => Request::SubdivisionMesh,
            Call::Blobby { .. } => Request::Blobby,
            Call::Geometry { .. } => Request::Geometry,
            Call::ReadArchive { .. } => Request::ReadArchive,
            Call::ArchiveRecord { .. } => Request::ArchiveRecord,
            Call::ErrorHandler { .. } => Request::ErrorHandler,
        }
    }

    /// Table that unqualified parameter names are looked up in.
    pub fn bind_scope(&self) -> BindScope<'_> {
        match self {
            Call::Option { name } | Call::Attribute { name } => BindScope::table(name),
            _ => BindScope::default(),
        }
    }

    /// Structural counts of the primitive, given the current basis steps.
    ///
    /// Counts too large to represent are a type error.
    pub fn counts(&self, ustep: usize, vstep: usize) -> Result<ParamCounts, RibError> {
        self.checked_counts(ustep, vstep).ok_or_else(|| {
            RibError::type_error(0, format!("{} sizes overflow its value counts", self.request()))
        })
    }

    fn checked_counts(&self, ustep: usize, vstep: usize) -> Option<ParamCounts> {
        let counts = match self {
            Call::Sphere { .. }
            | Call::Cone { .. }
            | Call::Cylinder { .. }
            | Call::Hyperboloid { .. }
            | Call::Paraboloid { .. }
            | Call::Disk { .. }
            | Call::Torus { .. } => ParamCounts::quadric(),

            Call::Polygon { nvertices } => ParamCounts::uniform(*nvertices, *nvertices),
            Call::Points { npoints } => ParamCounts::uniform(*npoints, *npoints),
            Call::GeneralPolygon { nverts } => {
                let n = sum(nverts)?;
                ParamCounts::uniform(n, n)
            }
            Call::PointsPolygons { nverts, verts } => mesh_counts(nverts.len(), nverts, verts)?,
            Call::PointsGeneralPolygons {
                nloops,
                nverts,
                verts,
            } => mesh_counts(nloops.len(), nverts, verts)?,
            Call::SubdivisionMesh { nverts, verts, .. } => {
                mesh_counts(nverts.len(), nverts, verts)?
            }

            Call::Patch { kind } => {
                let vertices = if kind == "bicubic" { 16 } else { 4 };
                ParamCounts::new(vertices, 4, 1, vertices, 4)
            }
            Call::PatchMesh {
                kind,
                nu,
                uwrap,
                nv,
                vwrap,
            } => {
                let bicubic = kind == "bicubic";
                let (nu, nv) = (to_count(*nu), to_count(*nv));
                let (pu, vu) = patch_span(nu, uwrap == "periodic", bicubic, ustep);
                let (pv, vv) = patch_span(nv, vwrap == "periodic", bicubic, vstep);
                let facets = pu.checked_mul(pv)?;
                let per_patch = if bicubic { 16 } else { 4 };
                ParamCounts::new(
                    nu.checked_mul(nv)?,
                    vu.checked_mul(vv)?,
                    facets,
                    facets.checked_mul(per_patch)?,
                    facets.checked_mul(4)?,
                )
            }
            Call::NuPatch {
                nu,
                uorder,
                nv,
                vorder,
                ..
            } => {
                let (nu, nv) = (to_count(*nu), to_count(*nv));
                let (uo, vo) = (to_count(*uorder), to_count(*vorder));
                let su = (nu + 1).saturating_sub(uo);
                let sv = (nv + 1).saturating_sub(vo);
                let facets = su.checked_mul(sv)?;
                ParamCounts::new(
                    nu.checked_mul(nv)?,
                    (su + 1).checked_mul(sv + 1)?,
                    facets,
                    uo.checked_mul(vo)?.checked_mul(facets)?,
                    facets.checked_mul(4)?,
                )
            }
            Call::Curves {
                kind,
                nvertices,
                wrap,
            } => {
                let periodic = wrap == "periodic";
                let vertices = sum(nvertices)?;
                let corners = if kind == "cubic" {
                    let step = vstep.max(1);
                    nvertices.iter().try_fold(0usize, |acc, &n| {
                        let n = to_count(n);
                        let corners = if periodic {
                            n / step
                        } else {
                            n.saturating_sub(4) / step + 2
                        };
                        acc.checked_add(corners)
                    })?
                } else {
                    vertices
                };
                ParamCounts::new(vertices, corners, nvertices.len(), vertices, corners)
            }
            Call::Blobby { nleaf, .. } => {
                let n = to_count(*nleaf);
                ParamCounts::uniform(n, n)
            }
            _ => ParamCounts::default(),
        };
        Some(counts)
    }
}

fn to_count(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn sum(values: &[i32]) -> Option<usize> {
    values
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(to_count(n)))
}

fn mesh_counts(faces: usize, nverts: &[i32], verts: &[i32]) -> Option<ParamCounts> {
    let vertices = verts.iter().map(|&v| to_count(v) + 1).max().unwrap_or(0);
    let face_vertices = sum(nverts)?;
    Some(ParamCounts::new(vertices, vertices, faces, face_vertices, face_vertices))
}

/// Patches and varying positions along one parametric direction.
fn patch_span(n: usize, periodic: bool, bicubic: bool, step: usize) -> (usize, usize) {
    if bicubic {
        let step = step.max(1);
        let patches = if periodic {
            n / step
        } else {
            n.saturating_sub(4) / step + 1
        };
        (patches, if periodic { patches } else { patches + 1 })
    } else {
        let patches = if periodic { n } else { n.saturating_sub(1) };
        (patches, n)
    }
}

/// A decoded call plus its trailing name/value pairs.
#[derive(Debug)]
pub struct Decoded<'a> {
    pub call: Call,
    pub params: Vec<(&'a str, &'a RawParameter)>,
    /// Handle key the stream attached to a newly created handle.
    pub binding: Option<(HandleKind, HandleKey, Handle)>,
}

/// Inputs positional decoding needs besides the raw slots.
pub struct DecodeEnv<'e> {
    pub color_samples: usize,
    pub handles: &'e HandleTables,
    pub allocate: &'e mut dyn FnMut() -> Handle,
}

struct Args<'a> {
    request: Request,
    slots: &'a [RawParameter],
    pos: usize,
    line: u32,
}

impl<'a> Args<'a> {
    fn err(&self, what: &str) -> RibError {
        let line = self.slots.get(self.pos).map(|s| s.line).unwrap_or(self.line);
        RibError::syntax(
            line,
            format!("{}: expected {} as argument {}", self.request, what, self.pos + 1),
        )
    }

    fn slot(&mut self, what: &str) -> Result<&'a RawParameter, RibError> {
        let s = self.slots.get(self.pos).ok_or_else(|| self.err(what))?;
        self.pos += 1;
        Ok(s)
    }

    fn peek(&self) -> Option<&'a RawParameter> {
        self.slots.get(self.pos)
    }

    fn float(&mut self) -> Result<f32, RibError> {
        let err = self.err("a number");
        match self.slot("a number")?.as_floats() {
            Some(v) if v.len() == 1 => Ok(v[0]),
            _ => Err(err),
        }
    }

    fn int(&mut self) -> Result<i32, RibError> {
        let err = self.err("an integer");
        match self.slot("an integer")?.as_ints() {
            Some(v) if v.len() == 1 => Ok(v[0]),
            _ => Err(err),
        }
    }

    fn string(&mut self) -> Result<String, RibError> {
        let err = self.err("a string");
        self.slot("a string")?
            .as_str()
            .map(str::to_owned)
            .ok_or(err)
    }

    fn floats(&mut self) -> Result<Vec<f32>, RibError> {
        let err = self.err("a number array");
        self.slot("a number array")?.as_floats().ok_or(err)
    }

    fn ints(&mut self) -> Result<Vec<i32>, RibError> {
        let err = self.err("an integer array");
        self.slot("an integer array")?.as_ints().ok_or(err)
    }

    fn strings(&mut self) -> Result<Vec<String>, RibError> {
        let err = self.err("a string array");
        self.slot("a string array")?
            .as_strings()
            .map(<[String]>::to_vec)
            .ok_or(err)
    }

    /// `n` numbers, given either as one array or as `n` loose numbers.
    fn numbers(&mut self, n: usize) -> Result<Vec<f32>, RibError> {
        let what = format!("{} numbers", n);
        let first = self.peek().ok_or_else(|| self.err(&what))?;
        if first.is_array {
            let err = self.err(&what);
            return match self.slot(&what)?.as_floats() {
                Some(v) if v.len() == n => Ok(v),
                _ => Err(err),
            };
        }
        (0..n).map(|_| self.float()).collect()
    }

    fn fixed<const N: usize>(&mut self) -> Result<[f32; N], RibError> {
        let err = self.err(&format!("{} numbers", N));
        let v = self.numbers(N)?;
        <[f32; N]>::try_from(v).map_err(|_| err)
    }

    fn handle_key(&mut self) -> Result<HandleKey, RibError> {
        let err = self.err("a handle number or name");
        let slot = self.slot("a handle number or name")?;
        if let Some(s) = slot.as_str() {
            return Ok(HandleKey::Name(s.to_owned()));
        }
        match slot.as_ints() {
            Some(v) if v.len() == 1 => Ok(HandleKey::Number(v[0])),
            _ => Err(err),
        }
    }

    fn basis(&mut self) -> Result<Basis, RibError> {
        let err = self.err("a basis name or 16 numbers");
        let slot = self.peek().ok_or_else(|| self.err("a basis"))?;
        if let Some(name) = slot.as_str() {
            self.pos += 1;
            return if Basis::is_known_name(name) {
                Ok(Basis::Named(name.to_owned()))
            } else {
                Err(RibError::syntax(slot.line, format!("unknown basis '{}'", name)))
            };
        }
        let m: Matrix = self.fixed::<16>().map_err(|_| err)?;
        Ok(Basis::Matrix(m))
    }

    fn bool(&mut self) -> Result<bool, RibError> {
        Ok(self.int()? != 0)
    }

    /// The remaining slots as name/value pairs.
    fn pairs(self) -> Result<Vec<(&'a str, &'a RawParameter)>, RibError> {
        let rest = &self.slots[self.pos.min(self.slots.len())..];
        let mut out = Vec::with_capacity(rest.len() / 2);
        let mut it = rest.iter();
        while let Some(name) = it.next() {
            let token = match (&name.values, name.is_array) {
                (RawValues::Strings(v), false) if v.len() == 1 => v[0].as_str(),
                _ => {
                    return Err(RibError::syntax(
                        name.line,
                        format!("{}: expected a parameter name", self.request),
                    ))
                }
            };
            let value = it.next().ok_or_else(|| {
                RibError::syntax(
                    name.line,
                    format!("{}: parameter '{}' has no value", self.request, token),
                )
            })?;
            out.push((token, value));
        }
        Ok(out)
    }
}

/// Vertex count of a primitive whose size is implied by its position data.
fn vertex_count(request: Request, line: u32, params: &[(&str, &RawParameter)]) -> Result<usize, RibError> {
    for (name, raw) in params {
        let per = match *name {
            "P" => 3,
            "Pw" => 4,
            "Pz" => 1,
            _ => continue,
        };
        return Ok(raw.len() / per);
    }
    Err(RibError::syntax(
        line,
        format!("{} requires a \"P\", \"Pw\" or \"Pz\" parameter", request),
    ))
}

/// Decode the positional arguments of `request` from `slots`.
pub fn decode<'a>(
    request: Request,
    line: u32,
    slots: &'a [RawParameter],
    env: &mut DecodeEnv<'_>,
) -> Result<Decoded<'a>, RibError> {
    let mut a = Args {
        request,
        slots,
        pos: 0,
        line,
    };
    let mut binding = None;
    let call = match request {
        Request::Begin => Call::Begin,
        Request::End => Call::End,
        Request::Version => Call::Version { version: a.float()? },
        Request::Declare => Call::Declare {
            name: a.string()?,
            declaration: a.string()?,
        },
        Request::FrameBegin => Call::FrameBegin { frame: a.int()? },
        Request::FrameEnd => Call::FrameEnd,
        Request::WorldBegin => Call::WorldBegin,
        Request::WorldEnd => Call::WorldEnd,
        Request::AttributeBegin => Call::AttributeBegin,
        Request::AttributeEnd => Call::AttributeEnd,
        Request::TransformBegin => Call::TransformBegin,
        Request::TransformEnd => Call::TransformEnd,
        Request::SolidBegin => Call::SolidBegin {
            operation: a.string()?,
        },
        Request::SolidEnd => Call::SolidEnd,
        Request::ObjectBegin => {
            let key = a.handle_key()?;
            let handle = (env.allocate)();
            binding = Some((HandleKind::Object, key, handle));
            Call::ObjectBegin { handle }
        }
        Request::ObjectEnd => Call::ObjectEnd,
        Request::ObjectInstance => {
            let key = a.handle_key()?;
            let handle = env
                .handles
                .resolve(HandleKind::Object, &key)
                .ok_or_else(|| RibError::bad(line, format!("unknown object handle {}", key)))?;
            Call::ObjectInstance { handle }
        }
        Request::MotionBegin => {
            let times = if a.peek().is_some_and(|s| s.is_array) {
                a.floats()?
            } else {
                let mut t = Vec::new();
                while a.peek().is_some() {
                    t.push(a.float()?);
                }
                t
            };
            Call::MotionBegin { times }
        }
        Request::MotionEnd => Call::MotionEnd,
        Request::ArchiveBegin => {
            let name = a.string()?;
            let handle = (env.allocate)();
            binding = Some((HandleKind::Archive, HandleKey::Name(name.clone()), handle));
            Call::ArchiveBegin { name, handle }
        }
        Request::ArchiveEnd => Call::ArchiveEnd,
        Request::ResourceBegin => Call::ResourceBegin,
        Request::ResourceEnd => Call::ResourceEnd,
        Request::Resource => Call::Resource {
            name: a.string()?,
            kind: a.string()?,
        },
        Request::IfBegin => Call::IfBegin {
            condition: a.string()?,
        },
        Request::ElseIf => Call::ElseIf {
            condition: a.string()?,
        },
        Request::Else => Call::Else,
        Request::IfEnd => Call::IfEnd,

        Request::Format => Call::Format {
            xres: a.int()?,
            yres: a.int()?,
            aspect: a.float()?,
        },
        Request::FrameAspectRatio => Call::FrameAspectRatio { aspect: a.float()? },
        Request::ScreenWindow => {
            let [left, right, bottom, top] = a.fixed::<4>()?;
            Call::ScreenWindow {
                left,
                right,
                bottom,
                top,
            }
        }
        Request::CropWindow => {
            let [xmin, xmax, ymin, ymax] = a.fixed::<4>()?;
            Call::CropWindow {
                xmin,
                xmax,
                ymin,
                ymax,
            }
        }
        Request::Projection => Call::Projection { name: a.string()? },
        Request::Clipping => Call::Clipping {
            near: a.float()?,
            far: a.float()?,
        },
        Request::ClippingPlane => {
            let [x, y, z, nx, ny, nz] = a.fixed::<6>()?;
            Call::ClippingPlane {
                point: [x, y, z],
                normal: [nx, ny, nz],
            }
        }
        Request::DepthOfField => Call::DepthOfField {
            fstop: a.float()?,
            focal_length: a.float()?,
            focal_distance: a.float()?,
        },
        Request::Shutter => Call::Shutter {
            open: a.float()?,
            close: a.float()?,
        },
        Request::PixelVariance => Call::PixelVariance {
            variance: a.float()?,
        },
        Request::PixelSamples => Call::PixelSamples {
            xsamples: a.float()?,
            ysamples: a.float()?,
        },
        Request::PixelFilter => Call::PixelFilter {
            filter: a.string()?,
            xwidth: a.float()?,
            ywidth: a.float()?,
        },
        Request::Exposure => Call::Exposure {
            gain: a.float()?,
            gamma: a.float()?,
        },
        Request::Imager => Call::Imager { name: a.string()? },
        Request::Quantize => Call::Quantize {
            kind: a.string()?,
            one: a.int()?,
            min: a.int()?,
            max: a.int()?,
            dither: a.float()?,
        },
        Request::Display => Call::Display {
            name: a.string()?,
            kind: a.string()?,
            mode: a.string()?,
        },
        Request::Hider => Call::Hider { kind: a.string()? },
        Request::ColorSamples => Call::ColorSamples {
            n_rgb: a.floats()?,
            rgb_n: a.floats()?,
        },
        Request::RelativeDetail => Call::RelativeDetail { detail: a.float()? },
        Request::Option => Call::Option { name: a.string()? },

        Request::Attribute => Call::Attribute { name: a.string()? },
        Request::Color => Call::Color {
            color: a.numbers(env.color_samples)?,
        },
        Request::Opacity => Call::Opacity {
            opacity: a.numbers(env.color_samples)?,
        },
        Request::TextureCoordinates => Call::TextureCoordinates { st: a.fixed::<8>()? },
        Request::LightSource | Request::AreaLightSource => {
            let shader = a.string()?;
            let key = a.handle_key()?;
            let handle = (env.allocate)();
            binding = Some((HandleKind::Light, key, handle));
            if request == Request::LightSource {
                Call::LightSource { shader, handle }
            } else {
                Call::AreaLightSource { shader, handle }
            }
        }
        Request::Illuminate => {
            let key = a.handle_key()?;
            let light = env
                .handles
                .resolve(HandleKind::Light, &key)
                .ok_or_else(|| RibError::bad(line, format!("unknown light handle {}", key)))?;
            Call::Illuminate {
                light,
                on: a.bool()?,
            }
        }
        Request::Surface => Call::Surface { shader: a.string()? },
        Request::Displacement => Call::Displacement { shader: a.string()? },
        Request::Atmosphere => Call::Atmosphere { shader: a.string()? },
        Request::Interior => Call::Interior { shader: a.string()? },
        Request::Exterior => Call::Exterior { shader: a.string()? },
        Request::ShadingRate => Call::ShadingRate { size: a.float()? },
        Request::ShadingInterpolation => Call::ShadingInterpolation { kind: a.string()? },
        Request::Matte => Call::Matte { on: a.bool()? },
        Request::Bound => Call::Bound { bound: a.fixed::<6>()? },
        Request::Detail => Call::Detail { bound: a.fixed::<6>()? },
        Request::DetailRange => {
            let [offlow, onlow, onhigh, offhigh] = a.fixed::<4>()?;
            Call::DetailRange {
                offlow,
                onlow,
                onhigh,
                offhigh,
            }
        }
        Request::GeometricApproximation => Call::GeometricApproximation {
            kind: a.string()?,
            value: a.float()?,
        },
        Request::Orientation => Call::Orientation {
            orientation: a.string()?,
        },
        Request::ReverseOrientation => Call::ReverseOrientation,
        Request::Sides => Call::Sides { sides: a.int()? },
        Request::Basis => Call::Basis {
            ubasis: a.basis()?,
            ustep: a.int()?,
            vbasis: a.basis()?,
            vstep: a.int()?,
        },

        Request::Identity => Call::Identity,
        Request::Transform => Call::Transform { matrix: a.fixed::<16>()? },
        Request::ConcatTransform => Call::ConcatTransform { matrix: a.fixed::<16>()? },
        Request::Perspective => Call::Perspective { fov: a.float()? },
        Request::Translate => {
            let [dx, dy, dz] = a.fixed::<3>()?;
            Call::Translate { dx, dy, dz }
        }
        Request::Rotate => {
            let [angle, dx, dy, dz] = a.fixed::<4>()?;
            Call::Rotate { angle, dx, dy, dz }
        }
        Request::Scale => {
            let [sx, sy, sz] = a.fixed::<3>()?;
            Call::Scale { sx, sy, sz }
        }
        Request::Skew => {
            let [angle, x1, y1, z1, x2, y2, z2] = a.fixed::<7>()?;
            Call::Skew {
                angle,
                from: [x1, y1, z1],
                to: [x2, y2, z2],
            }
        }
        Request::CoordinateSystem => Call::CoordinateSystem { space: a.string()? },
        Request::CoordSysTransform => Call::CoordSysTransform { space: a.string()? },
        Request::ScopedCoordinateSystem => Call::ScopedCoordinateSystem { space: a.string()? },

        Request::Polygon | Request::Points => {
            let params = a.pairs()?;
            let n = vertex_count(request, line, &params)?;
            let call = if request == Request::Polygon {
                Call::Polygon { nvertices: n }
            } else {
                Call::Points { npoints: n }
            };
            return Ok(Decoded {
                call,
                params,
                binding,
            });
        }
        Request::GeneralPolygon => Call::GeneralPolygon { nverts: a.ints()? },
        Request::PointsPolygons => Call::PointsPolygons {
            nverts: a.ints()?,
            verts: a.ints()?,
        },
        Request::PointsGeneralPolygons => Call::PointsGeneralPolygons {
            nloops: a.ints()?,
            nverts: a.ints()?,
            verts: a.ints()?,
        },
        Request::Patch => Call::Patch { kind: a.string()? },
        Request::PatchMesh => Call::PatchMesh {
            kind: a.string()?,
            nu: a.int()?,
            uwrap: a.string()?,
            nv: a.int()?,
            vwrap: a.string()?,
        },
        Request::NuPatch => Call::NuPatch {
            nu: a.int()?,
            uorder: a.int()?,
            uknot: a.floats()?,
            umin: a.float()?,
            umax: a.float()?,
            nv: a.int()?,
            vorder: a.int()?,
            vknot: a.floats()?,
            vmin: a.float()?,
            vmax: a.float()?,
        },
        Request::Sphere => {
            let [radius, zmin, zmax, thetamax] = a.fixed::<4>()?;
            Call::Sphere {
                radius,
                zmin,
                zmax,
                thetamax,
            }
        }
        Request::Cone => {
            let [height, radius, thetamax] = a.fixed::<3>()?;
            Call::Cone {
                height,
                radius,
                thetamax,
            }
        }
        Request::Cylinder => {
            let [radius, zmin, zmax, thetamax] = a.fixed::<4>()?;
            Call::Cylinder {
                radius,
                zmin,
                zmax,
                thetamax,
            }
        }
        Request::Hyperboloid => {
            let [x1, y1, z1, x2, y2, z2, thetamax] = a.fixed::<7>()?;
            Call::Hyperboloid {
                point1: [x1, y1, z1],
                point2: [x2, y2, z2],
                thetamax,
            }
        }
        Request::Paraboloid => {
            let [rmax, zmin, zmax, thetamax] = a.fixed::<4>()?;
            Call::Paraboloid {
                rmax,
                zmin,
                zmax,
                thetamax,
            }
        }
        Request::Disk => {
            let [height, radius, thetamax] = a.fixed::<3>()?;
            Call::Disk {
                height,
                radius,
                thetamax,
            }
        }
        Request::Torus => {
            let [major_radius, minor_radius, phimin, phimax, thetamax] = a.fixed::<5>()?;
            Call::Torus {
                major_radius,
                minor_radius,
                phimin,
                phimax,
                thetamax,
            }
        }
        Request::Curves => Call::Curves {
            kind: a.string()?,
            nvertices: a.ints()?,
            wrap: a.string()?,
        },
        Request::SubdivisionMesh => {
            let scheme = a.string()?;
            let nverts = a.ints()?;
            let verts = a.ints()?;
            // tags and their arguments are optional as a group
            let has_tags = a.peek().is_some_and(|s| s.is_array);
            let (tags, nargs, intargs, floatargs) = if has_tags {
                (a.strings()?, a.ints()?, a.ints()?, a.floats()?)
            } else {
                (Vec::new(), Vec::new(), Vec::new(), Vec::new())
            };
            Call::SubdivisionMesh {
                scheme,
                nverts,
                verts,
                tags,
                nargs,
                intargs,
                floatargs,
            }
        }
        Request::Blobby => Call::Blobby {
            nleaf: a.int()?,
            code: a.ints()?,
            floats: a.floats()?,
            strings: a.strings()?,
        },
        Request::Geometry => Call::Geometry { kind: a.string()? },

        Request::ReadArchive => {
            let name = a.string()?;
            let archive = env
                .handles
                .resolve(HandleKind::Archive, &HandleKey::Name(name.clone()));
            Call::ReadArchive { name, archive }
        }
        Request::ArchiveRecord => Call::ArchiveRecord {
            kind: a.string()?,
            text: a.string()?,
        },
        Request::ErrorHandler => Call::ErrorHandler { name: a.string()? },
    };
    let params = a.pairs()?;
    Ok(Decoded {
        call,
        params,
        binding,
    })
}
