//! The closed set of requests, their wire names and their legality table.

use std::fmt;

use serde::Serialize;

use crate::mode::{Mode, ModeBits};

macro_rules! requests {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum Request {
            $($variant,)*
        }

        impl Request {
            pub const ALL: &'static [Request] = &[$(Request::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Request::$variant => $name,)*
                }
            }

            fn lookup(name: &str) -> Option<Request> {
                match name {
                    $($name => Some(Request::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

requests! {
    Begin => "Begin",
    End => "End",
    Version => "version",
    Declare => "Declare",
    FrameBegin => "FrameBegin",
    FrameEnd => "FrameEnd",
    WorldBegin => "WorldBegin",
    WorldEnd => "WorldEnd",
    AttributeBegin => "AttributeBegin",
    AttributeEnd => "AttributeEnd",
    TransformBegin => "TransformBegin",
    TransformEnd => "TransformEnd",
    SolidBegin => "SolidBegin",
    SolidEnd => "SolidEnd",
    ObjectBegin => "ObjectBegin",
    ObjectEnd => "ObjectEnd",
    ObjectInstance => "ObjectInstance",
    MotionBegin => "MotionBegin",
    MotionEnd => "MotionEnd",
    ArchiveBegin => "ArchiveBegin",
    ArchiveEnd => "ArchiveEnd",
    ResourceBegin => "ResourceBegin",
    ResourceEnd => "ResourceEnd",
    Resource => "Resource",
    IfBegin => "IfBegin",
    ElseIf => "ElseIf",
    Else => "Else",
    IfEnd => "IfEnd",
    Format => "Format",
    FrameAspectRatio => "FrameAspectRatio",
    ScreenWindow => "ScreenWindow",
    CropWindow => "CropWindow",
    Projection => "Projection",
    Clipping => "Clipping",
    ClippingPlane => "ClippingPlane",
    DepthOfField => "DepthOfField",
    Shutter => "Shutter",
    PixelVariance => "PixelVariance",
    PixelSamples => "PixelSamples",
    PixelFilter => "PixelFilter",
    Exposure => "Exposure",
    Imager => "Imager",
    Quantize => "Quantize",
    Display => "Display",
    Hider => "Hider",
    ColorSamples => "ColorSamples",
    RelativeDetail => "RelativeDetail",
    Option => "Option",
    Attribute => "Attribute",
    Color => "Color",
    Opacity => "Opacity",
    TextureCoordinates => "TextureCoordinates",
    LightSource => "LightSource",
    AreaLightSource => "AreaLightSource",
    Illuminate => "Illuminate",
    Surface => "Surface",
    Displacement => "Displacement",
    Atmosphere => "Atmosphere",
    Interior => "Interior",
    Exterior => "Exterior",
    ShadingRate => "ShadingRate",
    ShadingInterpolation => "ShadingInterpolation",
    Matte => "Matte",
    Bound => "Bound",
    Detail => "Detail",
    DetailRange => "DetailRange",
    GeometricApproximation => "GeometricApproximation",
    Orientation => "Orientation",
    ReverseOrientation => "ReverseOrientation",
    Sides => "Sides",
    Basis => "Basis",
    Identity => "Identity",
    Transform => "Transform",
    ConcatTransform => "ConcatTransform",
    Perspective => "Perspective",
    Translate => "Translate",
    Rotate => "Rotate",
    Scale => "Scale",
    Skew => "Skew",
    CoordinateSystem => "CoordinateSystem",
    CoordSysTransform => "CoordSysTransform",
    ScopedCoordinateSystem => "ScopedCoordinateSystem",
    Polygon => "Polygon",
    GeneralPolygon => "GeneralPolygon",
    PointsPolygons => "PointsPolygons",
    PointsGeneralPolygons => "PointsGeneralPolygons",
    Patch => "Patch",
    PatchMesh => "PatchMesh",
    NuPatch => "NuPatch",
    Sphere => "Sphere",
    Cone => "Cone",
    Cylinder => "Cylinder",
    Hyperboloid => "Hyperboloid",
    Paraboloid => "Paraboloid",
    Disk => "Disk",
    Torus => "Torus",
    Points => "Points",
    Curves => "Curves",
    SubdivisionMesh => "SubdivisionMesh",
    Blobby => "Blobby",
    Geometry => "Geometry",
    ReadArchive => "ReadArchive",
    ArchiveRecord => "ArchiveRecord",
    ErrorHandler => "ErrorHandler",
}

impl Request {
    /// Resolve a wire name. `Begin` and `End` are reserved for the context
    /// API and never come off a stream.
    pub fn from_name(name: &str) -> Option<Request> {
        Request::lookup(name).filter(|r| !r.is_api_only())
    }

    pub fn is_api_only(self) -> bool {
        matches!(self, Request::Begin | Request::End)
    }

    /// Modes in which the request is legal.
    pub fn legal_modes(self) -> ModeBits {
        use Request::*;
        match self {
            Begin => ModeBits::OUTSIDE,
            End => ModeBits::BEGIN,
            Version | Declare | ArchiveRecord | ErrorHandler => ModeBits::ANY,
            ReadArchive => ModeBits::INSIDE.without(ModeBits::MOTION),

            FrameBegin => ModeBits::BEGIN,
            FrameEnd => ModeBits::FRAME,
            WorldBegin => ModeBits::BEGIN | ModeBits::FRAME,
            WorldEnd => ModeBits::WORLD,
            AttributeBegin | TransformBegin => ModeBits::STATE,
            AttributeEnd => ModeBits::ATTRIBUTE,
            TransformEnd => ModeBits::TRANSFORM,
            SolidBegin => ModeBits::WORLD | ModeBits::ATTRIBUTE | ModeBits::TRANSFORM | ModeBits::SOLID,
            SolidEnd => ModeBits::SOLID,
            ObjectBegin => ModeBits::SETUP | ModeBits::SCENE,
            ObjectEnd => ModeBits::OBJECT,
            ObjectInstance => ModeBits::SCENE,
            MotionBegin => ModeBits::STATE,
            MotionEnd => ModeBits::MOTION,
            ArchiveBegin => ModeBits::INSIDE.without(ModeBits::MOTION),
            ArchiveEnd => ModeBits::ARCHIVE,
            ResourceBegin | Resource => ModeBits::STATE,
            ResourceEnd => ModeBits::RESOURCE,
            IfBegin => ModeBits::INSIDE,
            ElseIf | Else => ModeBits::IF | ModeBits::ELSEIF,
            IfEnd => ModeBits::CONDITIONAL,

            Format | FrameAspectRatio | ScreenWindow | CropWindow | Projection | Clipping
            | ClippingPlane | DepthOfField | Shutter | PixelVariance | PixelSamples
            | PixelFilter | Exposure | Imager | Quantize | Display | Hider | ColorSamples
            | RelativeDetail | Option => ModeBits::SETUP,

            LightSource | AreaLightSource | Illuminate => ModeBits::SCENE,

            Color | Opacity | Surface | Displacement | Atmosphere | Interior | Exterior
            | Identity | Transform | ConcatTransform | Perspective | Translate | Rotate
            | Scale | Skew => ModeBits::STATE | ModeBits::MOTION,

            Attribute | TextureCoordinates | ShadingRate | ShadingInterpolation | Matte
            | Bound | Detail | DetailRange | GeometricApproximation | Orientation
            | ReverseOrientation | Sides | Basis | CoordinateSystem | CoordSysTransform
            | ScopedCoordinateSystem => ModeBits::STATE,

            Polygon | GeneralPolygon | PointsPolygons | PointsGeneralPolygons | Patch
            | PatchMesh | NuPatch | Sphere | Cone | Cylinder | Hyperboloid | Paraboloid
            | Disk | Torus | Points | Curves | SubdivisionMesh | Blobby | Geometry => {
                ModeBits::GEOMETRY
            }
        }
    }

    /// Mode pushed by a block opener.
    pub fn opens(self) -> Option<Mode> {
        match self {
            Request::Begin => Some(Mode::Begin),
            Request::FrameBegin => Some(Mode::Frame),
            Request::WorldBegin => Some(Mode::World),
            Request::AttributeBegin => Some(Mode::Attribute),
            Request::TransformBegin => Some(Mode::Transform),
            Request::SolidBegin => Some(Mode::Solid),
            Request::ObjectBegin => Some(Mode::Object),
            Request::MotionBegin => Some(Mode::Motion),
            Request::ArchiveBegin => Some(Mode::Archive),
            Request::ResourceBegin => Some(Mode::Resource),
            Request::IfBegin => Some(Mode::If),
            Request::ElseIf => Some(Mode::ElseIf),
            Request::Else => Some(Mode::Else),
            _ => None,
        }
    }

    /// Modes a block closer may close. `ElseIf` and `Else` close the previous
    /// branch before opening their own.
    pub fn closes(self) -> &'static [Mode] {
        match self {
            Request::End => &[Mode::Begin],
            Request::FrameEnd => &[Mode::Frame],
            Request::WorldEnd => &[Mode::World],
            Request::AttributeEnd => &[Mode::Attribute],
            Request::TransformEnd => &[Mode::Transform],
            Request::SolidEnd => &[Mode::Solid],
            Request::ObjectEnd => &[Mode::Object],
            Request::MotionEnd => &[Mode::Motion],
            Request::ArchiveEnd => &[Mode::Archive],
            Request::ResourceEnd => &[Mode::Resource],
            Request::ElseIf | Request::Else => &[Mode::If, Mode::ElseIf],
            Request::IfEnd => &[Mode::If, Mode::ElseIf, Mode::Else],
            _ => &[],
        }
    }

    pub fn is_geometry(self) -> bool {
        self.legal_modes() == ModeBits::GEOMETRY
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
