//! Storage classes, declaration types and the structural counts that tie
//! them to a primitive.

use std::fmt;

use serde::Serialize;

/// How many values a parameter carries relative to its primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    Constant,
    Uniform,
    Varying,
    Vertex,
    FaceVarying,
    FaceVertex,
}

impl StorageClass {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "constant" => Some(StorageClass::Constant),
            "uniform" => Some(StorageClass::Uniform),
            "varying" => Some(StorageClass::Varying),
            "vertex" => Some(StorageClass::Vertex),
            "facevarying" => Some(StorageClass::FaceVarying),
            "facevertex" => Some(StorageClass::FaceVertex),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            StorageClass::Constant => "constant",
            StorageClass::Uniform => "uniform",
            StorageClass::Varying => "varying",
            StorageClass::Vertex => "vertex",
            StorageClass::FaceVarying => "facevarying",
            StorageClass::FaceVertex => "facevertex",
        }
    }

    /// Number of elements a parameter of this class carries.
    pub fn count(self, counts: &ParamCounts) -> usize {
        match self {
            StorageClass::Constant => 1,
            StorageClass::Uniform => counts.facets,
            StorageClass::Varying => counts.corners,
            StorageClass::Vertex => counts.vertices,
            StorageClass::FaceVarying => counts.face_corners,
            StorageClass::FaceVertex => counts.face_vertices,
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Value representation on the wire and in bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicType {
    Integer,
    Float,
    String,
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BasicType::Integer => "integer",
            BasicType::Float => "float",
            BasicType::String => "string",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclType {
    Float,
    Integer,
    String,
    Point,
    Vector,
    Normal,
    HPoint,
    Matrix,
    Basis,
    Bound,
    Color,
}

impl DeclType {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "float" => Some(DeclType::Float),
            "integer" | "int" => Some(DeclType::Integer),
            "string" => Some(DeclType::String),
            "point" => Some(DeclType::Point),
            "vector" => Some(DeclType::Vector),
            "normal" => Some(DeclType::Normal),
            "hpoint" => Some(DeclType::HPoint),
            "matrix" => Some(DeclType::Matrix),
            "basis" => Some(DeclType::Basis),
            "bound" => Some(DeclType::Bound),
            "color" => Some(DeclType::Color),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DeclType::Float => "float",
            DeclType::Integer => "integer",
            DeclType::String => "string",
            DeclType::Point => "point",
            DeclType::Vector => "vector",
            DeclType::Normal => "normal",
            DeclType::HPoint => "hpoint",
            DeclType::Matrix => "matrix",
            DeclType::Basis => "basis",
            DeclType::Bound => "bound",
            DeclType::Color => "color",
        }
    }

    pub fn basic_type(self) -> BasicType {
        match self {
            DeclType::Integer => BasicType::Integer,
            DeclType::String => BasicType::String,
            _ => BasicType::Float,
        }
    }

    /// Components per element. Colors follow the active sample count.
    pub fn size(self, color_samples: usize) -> usize {
        match self {
            DeclType::Float | DeclType::Integer | DeclType::String => 1,
            DeclType::Point | DeclType::Vector | DeclType::Normal => 3,
            DeclType::HPoint => 4,
            DeclType::Matrix | DeclType::Basis => 16,
            DeclType::Bound => 6,
            DeclType::Color => color_samples,
        }
    }
}

impl fmt::Display for DeclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Structural counts of one primitive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamCounts {
    pub vertices: usize,
    pub corners: usize,
    pub facets: usize,
    pub face_vertices: usize,
    pub face_corners: usize,
}

impl Default for ParamCounts {
    /// Counts of a non-geometric request: one of everything.
    fn default() -> Self {
        ParamCounts::uniform(1, 1)
    }
}

impl ParamCounts {
    pub fn new(
        vertices: usize,
        corners: usize,
        facets: usize,
        face_vertices: usize,
        face_corners: usize,
    ) -> Self {
        ParamCounts {
            vertices,
            corners,
            facets,
            face_vertices,
            face_corners,
        }
    }

    /// Counts where per-face values equal the varying count.
    pub fn uniform(vertices: usize, corners: usize) -> Self {
        ParamCounts::new(vertices, corners, 1, vertices, corners)
    }

    /// Counts of the quadric surfaces (sphere, cone, torus, ...).
    pub fn quadric() -> Self {
        ParamCounts::new(4, 4, 1, 4, 4)
    }
}

/// Opaque reference to a retained object, light or archive. Valid within one
/// context only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(pub u32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
