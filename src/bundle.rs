//! Bundles: named members serialized back to back.
//!
//! A bundle may also declare links between siblings:
//!
//! - `present_when(optional, control, bit)`: the optional member exists exactly when bit
//!   `bit` of the control member is set. Applied before the optional is read and by
//!   [`BundleField::refresh`]; the control is the source of truth.
//! - `count_from(sequence, control)`: the unbounded sequence holds as many elements as the
//!   control integer says. Applied before the sequence is read; `refresh` copies the
//!   sequence's current count back into the control.
//!
//! Writing never refreshes implicitly: call `refresh()` after editing and before `write()`.
//! A bundle whose links do not hold, or whose count control cannot carry the sequence
//! length, is not `valid()`.

use crate::endian::{ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::{Field, FieldDef};
use crate::optional::OptionalMode;
use crate::sequence::SizeMode;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDef {
    name: String,
    def: FieldDef,
}

impl MemberDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn def(&self) -> &FieldDef {
        &self.def
    }
}

/// Dependency between two members, by member index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Presence { optional: usize, control: usize, bit: u32 },
    Count { sequence: usize, control: usize },
}

impl Link {
    /// Member whose read depends on the control.
    pub fn dependent(&self) -> usize {
        match *self {
            Link::Presence { optional, .. } => optional,
            Link::Count { sequence, .. } => sequence,
        }
    }

    pub fn control(&self) -> usize {
        match *self {
            Link::Presence { control, .. } | Link::Count { control, .. } => control,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleDef {
    members: Vec<MemberDef>,
    links: Vec<Link>,
}

impl BundleDef {
    pub fn builder() -> BundleBuilder {
        BundleBuilder::default()
    }

    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

#[derive(Debug, Default)]
pub struct BundleBuilder {
    members: Vec<MemberDef>,
    presence: Vec<(String, String, u32)>,
    counts: Vec<(String, String)>,
}

impl BundleBuilder {
    pub fn member(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.members.push(MemberDef { name: name.into(), def });
        self
    }

    pub fn present_when(mut self, optional: impl Into<String>, control: impl Into<String>, bit: u32) -> Self {
        self.presence.push((optional.into(), control.into(), bit));
        self
    }

    pub fn count_from(mut self, sequence: impl Into<String>, control: impl Into<String>) -> Self {
        self.counts.push((sequence.into(), control.into()));
        self
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        Ok(FieldDef::Bundle(Arc::new(self.finish()?)))
    }

    pub fn finish(self) -> Result<BundleDef, DefinitionError> {
        let BundleBuilder {
            members,
            presence,
            counts,
        } = self;
        for (i, m) in members.iter().enumerate() {
            if m.name.is_empty() {
                return Err(DefinitionError::InvalidOption("bundle member without a name".into()));
            }
            if members[..i].iter().any(|o| o.name == m.name) {
                return Err(DefinitionError::DuplicateName(m.name.clone()));
            }
        }
        let find = |name: &str| {
            members
                .iter()
                .position(|m| m.name == name)
                .ok_or_else(|| DefinitionError::UnknownMember(name.to_string()))
        };
        let mut links = Vec::with_capacity(presence.len() + counts.len());
        for (opt, ctl, bit) in &presence {
            let (o, c) = (find(opt)?, find(ctl)?);
            if !matches!(members[o].def, FieldDef::Optional(_)) {
                return Err(DefinitionError::InvalidLink(format!("{} is not optional", opt)));
            }
            if !matches!(
                members[c].def,
                FieldDef::Int(_) | FieldDef::Enum(_) | FieldDef::Bitmask(_)
            ) {
                return Err(DefinitionError::InvalidLink(format!(
                    "{} cannot control presence (needs an int, enum or bitmask)",
                    ctl
                )));
            }
            if *bit >= 64 {
                return Err(DefinitionError::InvalidLink(format!("bit {} of {}", bit, ctl)));
            }
            links.push(Link::Presence {
                optional: o,
                control: c,
                bit: *bit,
            });
        }
        for (seq, ctl) in &counts {
            let (s, c) = (find(seq)?, find(ctl)?);
            let unbounded = match &members[s].def {
                FieldDef::List(d) => {
                    if d.element().min_length() == 0 {
                        return Err(DefinitionError::InvalidLink(format!(
                            "elements of {} may be empty",
                            seq
                        )));
                    }
                    matches!(d.size_mode(), SizeMode::Unbounded)
                }
                FieldDef::Bytes(d) => matches!(d.size_mode(), SizeMode::Unbounded),
                _ => false,
            };
            if !unbounded {
                return Err(DefinitionError::InvalidLink(format!(
                    "{} must be a sequence without its own size",
                    seq
                )));
            }
            if !matches!(members[c].def, FieldDef::Int(_)) {
                return Err(DefinitionError::InvalidLink(format!("{} is not an int", ctl)));
            }
            links.push(Link::Count { sequence: s, control: c });
        }
        for (i, link) in links.iter().enumerate() {
            if link.control() >= link.dependent() {
                return Err(DefinitionError::InvalidLink(format!(
                    "{} must come before {}",
                    members[link.control()].name,
                    members[link.dependent()].name
                )));
            }
            if links[..i].iter().any(|l| l.dependent() == link.dependent()) {
                return Err(DefinitionError::InvalidLink(format!(
                    "{} has more than one control",
                    members[link.dependent()].name
                )));
            }
        }
        Ok(BundleDef { members, links })
    }
}

fn control_bit(control: &Field, bit: u32) -> bool {
    control.raw_bits().map_or(false, |v| (v >> bit) & 1 == 1)
}

/// Make the dependent member match its control before it is read.
fn apply_link(link: &Link, members: &mut [Field]) {
    match *link {
        Link::Presence { optional, control, bit } => {
            let mode = if control_bit(&members[control], bit) {
                OptionalMode::Exists
            } else {
                OptionalMode::Missing
            };
            if let Some(o) = members[optional].as_optional_mut() {
                o.set_mode(mode);
            }
        }
        Link::Count { sequence, control } => {
            let count = members[control]
                .as_int()
                .map(|f| usize::try_from(f.value_u64()).unwrap_or(usize::MAX));
            members[sequence].force_count(count);
        }
    }
}

/// Whether the control currently describes its dependent.
fn link_holds(link: &Link, members: &[Field]) -> bool {
    match *link {
        Link::Presence { optional, control, bit } => match members[optional].as_optional() {
            Some(o) => o.is_missing() != control_bit(&members[control], bit),
            None => false,
        },
        Link::Count { sequence, control } => match (members[control].as_int(), members[sequence].element_count()) {
            (Some(c), Some(n)) => c.value_u64() == n as u64 && c.fits_encoding(),
            _ => false,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleField {
    def: Arc<BundleDef>,
    members: Vec<Field>,
}

impl BundleField {
    pub fn new(def: Arc<BundleDef>) -> Self {
        let members = def.members.iter().map(|m| m.def.create()).collect();
        BundleField { def, members }
    }

    pub fn def(&self) -> &Arc<BundleDef> {
        &self.def
    }

    pub fn members(&self) -> &[Field] {
        &self.members
    }

    /// Members paired with their names, in declaration order.
    pub fn named_members(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.def.members.iter().map(|m| m.name.as_str()).zip(self.members.iter())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.def.index_of(name).map(|i| &self.members[i])
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        let i = self.def.index_of(name)?;
        Some(&mut self.members[i])
    }

    pub fn length(&self) -> usize {
        self.members.iter().map(Field::length).sum()
    }

    /// Every member is valid and every link holds, so a read sees what was written.
    pub fn valid(&self) -> bool {
        self.members.iter().all(Field::valid) && self.def.links.iter().all(|l| link_holds(l, &self.members))
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        for i in 0..self.members.len() {
            for link in self.def.links.iter().filter(|l| l.dependent() == i) {
                apply_link(link, &mut self.members);
            }
            self.members[i].read(r)?;
        }
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        for m in &self.members {
            m.write(w)?;
        }
        Ok(())
    }

    /// Bring controls and dependents in line, then refresh members. Returns whether anything changed.
    pub fn refresh(&mut self) -> bool {
        let mut changed = false;
        for link in &self.def.links {
            match *link {
                Link::Count { sequence, control } => {
                    let count = self.members[sequence].element_count().unwrap_or(0) as u64;
                    if let Some(c) = self.members[control].as_int_mut() {
                        let before = c.value();
                        c.set_value_u64(count);
                        changed |= c.value() != before;
                    }
                }
                Link::Presence { optional, control, bit } => {
                    let mode = if control_bit(&self.members[control], bit) {
                        OptionalMode::Exists
                    } else {
                        OptionalMode::Missing
                    };
                    if let Some(o) = self.members[optional].as_optional_mut() {
                        if o.mode() != mode {
                            o.set_mode(mode);
                            changed = true;
                        }
                    }
                }
            }
        }
        self.members.iter_mut().fold(changed, |c, m| m.refresh() | c)
    }
}
