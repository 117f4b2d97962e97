//! Block-nesting state machine.
//!
//! Every `xBegin` pushes a mode together with a composite legality mask;
//! every `xEnd` pops one level. Opaque modes start a fresh mask, transparent
//! ones (resource and conditional blocks) add their bit to the enclosing
//! mask so requests legal outside remain legal inside.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::Serialize;

use crate::request::Request;
use crate::types::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Outside,
    Begin,
    Frame,
    World,
    Attribute,
    Transform,
    Solid,
    Object,
    Motion,
    Archive,
    Resource,
    If,
    ElseIf,
    Else,
}

impl Mode {
    pub fn bit(self) -> ModeBits {
        match self {
            Mode::Outside => ModeBits::OUTSIDE,
            Mode::Begin => ModeBits::BEGIN,
            Mode::Frame => ModeBits::FRAME,
            Mode::World => ModeBits::WORLD,
            Mode::Attribute => ModeBits::ATTRIBUTE,
            Mode::Transform => ModeBits::TRANSFORM,
            Mode::Solid => ModeBits::SOLID,
            Mode::Object => ModeBits::OBJECT,
            Mode::Motion => ModeBits::MOTION,
            Mode::Archive => ModeBits::ARCHIVE,
            Mode::Resource => ModeBits::RESOURCE,
            Mode::If => ModeBits::IF,
            Mode::ElseIf => ModeBits::ELSEIF,
            Mode::Else => ModeBits::ELSE,
        }
    }

    /// Transparent modes inherit the legality bits of their enclosing scope.
    pub fn is_transparent(self) -> bool {
        matches!(self, Mode::Resource | Mode::If | Mode::ElseIf | Mode::Else)
    }

    pub fn is_conditional(self) -> bool {
        matches!(self, Mode::If | Mode::ElseIf | Mode::Else)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ModeBits(u32);

impl ModeBits {
    pub const NONE: ModeBits = ModeBits(0);
    pub const OUTSIDE: ModeBits = ModeBits(1 << 0);
    pub const BEGIN: ModeBits = ModeBits(1 << 1);
    pub const FRAME: ModeBits = ModeBits(1 << 2);
    pub const WORLD: ModeBits = ModeBits(1 << 3);
    pub const ATTRIBUTE: ModeBits = ModeBits(1 << 4);
    pub const TRANSFORM: ModeBits = ModeBits(1 << 5);
    pub const SOLID: ModeBits = ModeBits(1 << 6);
    pub const OBJECT: ModeBits = ModeBits(1 << 7);
    pub const MOTION: ModeBits = ModeBits(1 << 8);
    pub const ARCHIVE: ModeBits = ModeBits(1 << 9);
    pub const RESOURCE: ModeBits = ModeBits(1 << 10);
    pub const IF: ModeBits = ModeBits(1 << 11);
    pub const ELSEIF: ModeBits = ModeBits(1 << 12);
    pub const ELSE: ModeBits = ModeBits(1 << 13);

    /// Option scope: before the world block.
    pub const SETUP: ModeBits = ModeBits(Self::BEGIN.0 | Self::FRAME.0 | Self::ARCHIVE.0);
    /// Where geometry, lights and instances are placed.
    pub const SCENE: ModeBits = ModeBits(
        Self::WORLD.0 | Self::ATTRIBUTE.0 | Self::TRANSFORM.0 | Self::SOLID.0 | Self::ARCHIVE.0,
    );
    /// Where attribute and transform state may change.
    pub const STATE: ModeBits = ModeBits(Self::SETUP.0 | Self::SCENE.0 | Self::OBJECT.0);
    pub const GEOMETRY: ModeBits = ModeBits(Self::SCENE.0 | Self::OBJECT.0 | Self::MOTION.0);
    pub const CONDITIONAL: ModeBits = ModeBits(Self::IF.0 | Self::ELSEIF.0 | Self::ELSE.0);
    /// Everywhere between `Begin` and `End`.
    pub const INSIDE: ModeBits = ModeBits(
        Self::STATE.0 | Self::MOTION.0 | Self::RESOURCE.0 | Self::CONDITIONAL.0,
    );
    pub const ANY: ModeBits = ModeBits(Self::INSIDE.0 | Self::OUTSIDE.0);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn intersects(self, other: ModeBits) -> bool {
        self.0 & other.0 != 0
    }

    pub fn without(self, other: ModeBits) -> ModeBits {
        ModeBits(self.0 & !other.0)
    }
}

impl BitOr for ModeBits {
    type Output = ModeBits;

    fn bitor(self, rhs: ModeBits) -> ModeBits {
        ModeBits(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModeBits {
    fn bitor_assign(&mut self, rhs: ModeBits) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ModeBits {
    type Output = ModeBits;

    fn bitand(self, rhs: ModeBits) -> ModeBits {
        ModeBits(self.0 & rhs.0)
    }
}

/// Result of closing one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped {
    pub mode: Mode,
    /// Area light that was open in the closed scope and is now finished.
    pub closed_area_light: Option<Handle>,
}

#[derive(Debug, Clone, Default)]
pub struct ModeStack {
    modes: Vec<Mode>,
    masks: Vec<ModeBits>,
    /// Open area light and the depth of the scope it belongs to.
    area_light: Option<(Handle, usize)>,
}

impl ModeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn current_mode(&self) -> Mode {
        self.modes.last().copied().unwrap_or(Mode::Outside)
    }

    pub fn current_bits(&self) -> ModeBits {
        self.masks.last().copied().unwrap_or(ModeBits::OUTSIDE)
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    /// True if any bit of `mask` is set in the composite mask.
    pub fn accepts(&self, mask: ModeBits) -> bool {
        self.current_bits().intersects(mask)
    }

    pub fn is_legal(&self, request: Request) -> bool {
        self.accepts(request.legal_modes())
    }

    pub fn push(&mut self, mode: Mode) {
        let mask = if mode.is_transparent() {
            self.current_bits() | mode.bit()
        } else {
            mode.bit()
        };
        self.modes.push(mode);
        self.masks.push(mask);
    }

    /// Close the innermost scope. An empty stack pops to `Outside`.
    pub fn pop(&mut self) -> Popped {
        let Some(mode) = self.modes.pop() else {
            return Popped {
                mode: Mode::Outside,
                closed_area_light: None,
            };
        };
        self.masks.pop();
        let closed_area_light = match self.area_light {
            Some((handle, depth)) if self.modes.len() < depth => {
                self.area_light = None;
                Some(handle)
            }
            _ => None,
        };
        Popped {
            mode,
            closed_area_light,
        }
    }

    /// Open an area light in the current scope. Returns a previously open
    /// area light, which is implicitly closed.
    pub fn start_area_light(&mut self, handle: Handle) -> Option<Handle> {
        let previous = self.area_light.take().map(|(h, _)| h);
        self.area_light = Some((handle, self.modes.len()));
        previous
    }

    pub fn open_area_light(&self) -> Option<Handle> {
        self.area_light.map(|(h, _)| h)
    }

    /// Drop every scope. Returns the area light that was still open.
    pub fn clear(&mut self) -> Option<Handle> {
        self.modes.clear();
        self.masks.clear();
        self.area_light.take().map(|(h, _)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_is_outside() {
        let mut stack = ModeStack::new();
        assert_eq!(stack.current_mode(), Mode::Outside);
        assert_eq!(stack.pop().mode, Mode::Outside);
        assert!(stack.is_empty());
        assert!(stack.accepts(ModeBits::OUTSIDE));
    }

    #[test]
    fn opaque_modes_start_fresh() {
        let mut stack = ModeStack::new();
        stack.push(Mode::Begin);
        stack.push(Mode::World);
        stack.push(Mode::Attribute);
        assert!(stack.accepts(ModeBits::ATTRIBUTE));
        assert!(!stack.accepts(ModeBits::WORLD));
    }

    #[test]
    fn transparent_modes_inherit() {
        let mut stack = ModeStack::new();
        stack.push(Mode::Begin);
        stack.push(Mode::World);
        stack.push(Mode::Attribute);
        stack.push(Mode::Resource);
        assert!(stack.accepts(ModeBits::ATTRIBUTE));
        assert!(stack.accepts(ModeBits::RESOURCE));
        assert!(!stack.accepts(ModeBits::WORLD));
        stack.push(Mode::If);
        assert!(stack.accepts(ModeBits::ATTRIBUTE | ModeBits::IF));
        stack.pop();
        stack.pop();
        assert_eq!(stack.current_bits(), ModeBits::ATTRIBUTE);
    }

    #[test]
    fn area_light_closes_with_its_scope() {
        let mut stack = ModeStack::new();
        stack.push(Mode::Begin);
        stack.push(Mode::World);
        stack.push(Mode::Attribute);
        assert_eq!(stack.start_area_light(Handle(7)), None);
        stack.push(Mode::Transform);
        assert_eq!(stack.pop().closed_area_light, None);
        assert_eq!(stack.open_area_light(), Some(Handle(7)));
        let popped = stack.pop();
        assert_eq!(popped.mode, Mode::Attribute);
        assert_eq!(popped.closed_area_light, Some(Handle(7)));
        assert_eq!(stack.open_area_light(), None);
    }

    #[test]
    fn new_area_light_replaces_open_one() {
        let mut stack = ModeStack::new();
        stack.push(Mode::Begin);
        stack.push(Mode::World);
        stack.start_area_light(Handle(1));
        assert_eq!(stack.start_area_light(Handle(2)), Some(Handle(1)));
        assert_eq!(stack.clear(), Some(Handle(2)));
    }
}
