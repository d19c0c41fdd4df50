//! Resolve a parsed definition file into a [`Protocol`].
//!
//! Named types are looked up by name: enums first, then structs. Structs are built
//! once and shared; a struct that (directly or indirectly) contains itself is
//! rejected. Integers, floats, bitmasks and bitfields without an explicit `endian`
//! option take the file's `endian` declaration (big endian when absent).

use crate::ast::*;
use crate::bitfield::BitfieldDef;
use crate::bitmask::BitmaskDef;
use crate::bundle::{BundleBuilder, BundleDef};
use crate::bytes::BytesDef;
use crate::endian::Endian;
use crate::enumeration::EnumDef;
use crate::field::FieldDef;
use crate::float::FloatDef;
use crate::frame::{FrameDef, Layer, LayerKind};
use crate::int::IntDef;
use crate::message::MessageDef;
use crate::optional::{OptionalDef, OptionalMode};
use crate::protocol::Protocol;
use crate::sequence::{ListDef, SizeMode};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve AST into a protocol ready for encoding and decoding.
pub fn resolve(ast: &ProtocolFile) -> Result<Protocol, String> {
    let mut resolver = Resolver::new(ast)?;
    for section in &ast.structs {
        resolver.structure(&section.name)?;
    }
    let frame = match &ast.frame {
        Some(layers) => resolver.frame(layers)?,
        None => FrameDef::default(),
    };
    let mut protocol = Protocol::new(frame);
    for msg in &ast.messages {
        let body = resolver
            .bundle(&msg.fields)
            .map_err(|e| format!("message {}: {}", msg.name, e))?;
        protocol
            .register(MessageDef::new(msg.id, msg.name.clone(), body))
            .map_err(|e| format!("message {}: {}", msg.name, e))?;
    }
    Ok(protocol)
}

struct Resolver<'a> {
    ast: &'a ProtocolFile,
    endian: Endian,
    enums: HashMap<&'a str, FieldDef>,
    structs: HashMap<&'a str, FieldDef>,
    /// Structs currently being built, outermost first.
    stack: Vec<&'a str>,
}

impl<'a> Resolver<'a> {
    fn new(ast: &'a ProtocolFile) -> Result<Self, String> {
        let mut resolver = Resolver {
            ast,
            endian: ast.endian.unwrap_or_default(),
            enums: HashMap::new(),
            structs: HashMap::new(),
            stack: Vec::new(),
        };
        for (i, s) in ast.structs.iter().enumerate() {
            if ast.structs[..i].iter().any(|o| o.name == s.name) {
                return Err(format!("struct {} defined more than once", s.name));
            }
        }
        for section in &ast.enums {
            if resolver.enums.contains_key(section.name.as_str()) {
                return Err(format!("enum {} defined more than once", section.name));
            }
            if ast.structs.iter().any(|s| s.name == section.name) {
                return Err(format!("{} is both an enum and a struct", section.name));
            }
            let def = section
                .variants
                .iter()
                .fold(
                    EnumDef::new(section.name.clone(), resolver.int_def(&section.base)),
                    |def, (name, value)| def.variant(name.clone(), *value),
                )
                .build()
                .map_err(|e| format!("enum {}: {}", section.name, e))?;
            resolver.enums.insert(section.name.as_str(), def);
        }
        Ok(resolver)
    }

    fn int_def(&self, spec: &IntSpec) -> IntDef {
        spec.options
            .iter()
            .fold(IntDef::new(spec.ty).endian(self.endian), |def, opt| match *opt {
                IntOption::Len(n) => def.length(n),
                IntOption::Bits(b) => def.bits(b),
                IntOption::VarLen(min, max) => def.var_length(min, max),
                IntOption::Scale(num, den) => def.scaling(num, den),
                IntOption::Offset(off) => def.ser_offset(off),
                IntOption::Range(lo, hi) => def.valid_range(lo, hi),
                IntOption::Endian(e) => def.endian(e),
                IntOption::Strict => def.fail_on_invalid(),
                IntOption::Default(v) => def.default_value(v),
            })
    }

    fn shared_int(&self, spec: &IntSpec) -> Result<Arc<IntDef>, String> {
        self.int_def(spec).shared().map_err(|e| e.to_string())
    }

    fn structure(&mut self, name: &str) -> Result<FieldDef, String> {
        if let Some(def) = self.structs.get(name) {
            return Ok(def.clone());
        }
        if let Some(start) = self.stack.iter().position(|n| *n == name) {
            let mut cycle = self.stack[start..].to_vec();
            cycle.push(self.stack[start]);
            return Err(format!("recursive struct: {}", cycle.join(" -> ")));
        }
        let ast = self.ast;
        let section = ast
            .structs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| format!("unknown type {}", name))?;
        self.stack.push(&section.name);
        let body = self.bundle(&section.fields);
        self.stack.pop();
        let def = FieldDef::Bundle(Arc::new(body.map_err(|e| format!("struct {}: {}", name, e))?));
        self.structs.insert(&section.name, def.clone());
        Ok(def)
    }

    fn named(&mut self, name: &str) -> Result<FieldDef, String> {
        match self.enums.get(name) {
            Some(def) => Ok(def.clone()),
            None => self.structure(name),
        }
    }

    /// Member list of a struct, message or inline bundle. Presence and count links
    /// between siblings are only expressible here.
    fn bundle(&mut self, fields: &[FieldSpec]) -> Result<BundleDef, String> {
        let mut builder = BundleDef::builder();
        for field in fields {
            let def = match &field.ty {
                TypeSpec::Optional(spec) => {
                    if let Some((control, bit)) = &spec.when {
                        builder = builder.present_when(field.name.clone(), control.clone(), *bit);
                    }
                    self.optional(spec)
                }
                TypeSpec::List(element, Some(SizeSpec::CountFrom(control))) => {
                    builder = builder.count_from(field.name.clone(), control.clone());
                    let element = self.type_def(element)?;
                    ListDef::new(element, SizeMode::Unbounded).build().map_err(|e| e.to_string())
                }
                TypeSpec::Bytes(Some(SizeSpec::CountFrom(control))) => {
                    builder = builder.count_from(field.name.clone(), control.clone());
                    BytesDef::raw(SizeMode::Unbounded).build().map_err(|e| e.to_string())
                }
                TypeSpec::String(Some(SizeSpec::CountFrom(control))) => {
                    builder = builder.count_from(field.name.clone(), control.clone());
                    BytesDef::string(SizeMode::Unbounded).build().map_err(|e| e.to_string())
                }
                other => self.type_def(other),
            }
            .map_err(|e| format!("{}: {}", field.name, e))?;
            builder = builder.member(field.name.clone(), def);
        }
        builder.finish().map_err(|e| e.to_string())
    }

    fn optional(&mut self, spec: &OptionalSpec) -> Result<FieldDef, String> {
        let inner = self.type_def(&spec.inner)?;
        let mode = spec.mode.unwrap_or(if spec.when.is_some() {
            OptionalMode::Missing
        } else {
            OptionalMode::Tentative
        });
        OptionalDef::new(inner).mode(mode).build().map_err(|e| e.to_string())
    }

    fn size_mode(&self, size: Option<&SizeSpec>) -> Result<SizeMode, String> {
        Ok(match size {
            None => SizeMode::Unbounded,
            Some(SizeSpec::Count(spec)) => SizeMode::CountPrefix(self.shared_int(spec)?),
            Some(SizeSpec::Length(spec)) => SizeMode::LengthPrefix(self.shared_int(spec)?),
            Some(SizeSpec::Fixed(n)) => SizeMode::Fixed(*n),
            Some(SizeSpec::Until(spec)) => SizeMode::Terminated(self.shared_int(spec)?),
            Some(SizeSpec::CountFrom(control)) => {
                return Err(format!("count_from({}) only applies to a struct or message member", control))
            }
        })
    }

    fn type_def(&mut self, ty: &TypeSpec) -> Result<FieldDef, String> {
        let def = match ty {
            TypeSpec::Int(spec) => self.int_def(spec).build(),
            TypeSpec::Float(spec) => {
                let def = FloatDef::new(spec.ty).endian(spec.endian.unwrap_or(self.endian));
                let def = spec.ranges.iter().fold(def, |d, (lo, hi)| d.valid_range(*lo, *hi));
                let def = match spec.default {
                    Some(v) => def.default_value(v),
                    None => def,
                };
                def.build()
            }
            TypeSpec::Bitmask(spec) => self.bitmask_def(spec).build(),
            TypeSpec::Bitfield(spec) => return self.bitfield(spec),
            TypeSpec::Bundle(fields) => Ok(FieldDef::Bundle(Arc::new(self.bundle(fields)?))),
            TypeSpec::Optional(spec) => {
                if let Some((control, _)) = &spec.when {
                    return Err(format!("`when {}` only applies to a struct or message member", control));
                }
                return self.optional(spec);
            }
            TypeSpec::List(element, size) => {
                let element = self.type_def(element)?;
                ListDef::new(element, self.size_mode(size.as_ref())?).build()
            }
            TypeSpec::Bytes(size) => BytesDef::raw(self.size_mode(size.as_ref())?).build(),
            TypeSpec::String(size) => BytesDef::string(self.size_mode(size.as_ref())?).build(),
            TypeSpec::Named(name) => return self.named(name),
        };
        def.map_err(|e| e.to_string())
    }

    fn bitmask_def(&self, spec: &BitmaskSpec) -> BitmaskDef {
        let mut def = BitmaskDef::new(spec.len).endian(spec.endian.unwrap_or(self.endian));
        if let Some((mask, value)) = spec.reserved {
            def = def.reserved(mask, value);
        }
        if let Some(v) = spec.default {
            def = def.default_value(v);
        }
        if spec.strict {
            def = def.fail_on_invalid();
        }
        spec.bits.iter().fold(def, |d, (name, idx)| d.bit(name.clone(), *idx))
    }

    fn bitfield(&mut self, spec: &BitfieldSpec) -> Result<FieldDef, String> {
        let mut builder = BitfieldDef::builder()
            .bit_order(spec.order)
            .endian(spec.endian.unwrap_or(self.endian));
        for member in &spec.members {
            let def = self.type_def(&member.ty).map_err(|e| format!("{}: {}", member.name, e))?;
            let bits = match member.bits {
                Some(b) => b,
                None => natural_bits(&def)
                    .ok_or_else(|| format!("{}: bitfield member needs a fixed width", member.name))?,
            };
            builder = builder.member(member.name.clone(), def, bits);
        }
        builder.build().map_err(|e| e.to_string())
    }

    fn frame(&self, layers: &[LayerSpec]) -> Result<FrameDef, String> {
        let first = layers
            .iter()
            .find_map(|l| match l {
                LayerSpec::Sync(_) => None,
                LayerSpec::Size(_) => Some(LayerKind::Size),
                LayerSpec::Id(_) => Some(LayerKind::Id),
                LayerSpec::Payload | LayerSpec::Checksum { .. } => Some(LayerKind::Payload),
            })
            .unwrap_or(LayerKind::Payload);
        let layers = layers
            .iter()
            .map(|l| {
                Ok(match l {
                    LayerSpec::Sync(bytes) => Layer::Sync(bytes.clone()),
                    LayerSpec::Size(spec) => Layer::Size(self.shared_int(spec)?),
                    LayerSpec::Id(spec) => Layer::Id(self.shared_int(spec)?),
                    LayerSpec::Payload => Layer::Payload,
                    LayerSpec::Checksum { algorithm, field, from } => Layer::Checksum {
                        algorithm: *algorithm,
                        field: self.shared_int(field)?,
                        from: from.unwrap_or(first),
                    },
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        FrameDef::new(layers).map_err(|e| format!("frame: {}", e))
    }
}

/// Width a bitfield member takes when none is given.
fn natural_bits(def: &FieldDef) -> Option<u32> {
    match def {
        FieldDef::Int(d) => d.serialized_bits(),
        FieldDef::Enum(d) => d.int_def().serialized_bits(),
        FieldDef::Bitmask(d) => Some(d.length() as u32 * 8),
        _ => None,
    }
}
